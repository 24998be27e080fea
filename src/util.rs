use std::net::Ipv4Addr;

const SENTINEL_PORT: &str = "SENTINEL_PORT";

pub const DEFAULT_PORT: u16 = 8080;

pub fn get_port() -> u16 {
    let port_from_env = std::env::var(SENTINEL_PORT);
    port_from_env.map_or(DEFAULT_PORT, |res| res.parse().unwrap_or(DEFAULT_PORT))
}

const SENTINEL_ADDR: &str = "SENTINEL_ADDR";

pub const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

pub fn get_addr() -> Ipv4Addr {
    let addr_from_env = std::env::var(SENTINEL_ADDR);
    addr_from_env.map_or(DEFAULT_ADDR, |res| res.parse().unwrap_or(DEFAULT_ADDR))
}

/// Bind address built from the environment, if either variable is set
pub fn get_bind_addr() -> Option<String> {
    if std::env::var(SENTINEL_ADDR).is_err() && std::env::var(SENTINEL_PORT).is_err() {
        return None;
    }
    Some(format!("{}:{}", get_addr(), get_port()))
}

const SENTINEL_TOKEN: &str = "SENTINEL_TOKEN";

pub fn get_token() -> Option<String> {
    let token_from_env = std::env::var(SENTINEL_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}
