use std::net::TcpListener;

/// 端口能否绑定，探测用的监听器立即释放
pub fn is_port_available_sync(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// 从 start_port 起向上扫描可用端口，最多试 10 个，全部被占时原样返回
pub fn available_port(start_port: u16) -> u16 {
    let end = start_port.saturating_add(10);
    (start_port..=end)
        .find(|&port| is_port_available_sync(port))
        .unwrap_or(start_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_port_reported_unavailable() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_port_available_sync(port));
        assert_ne!(available_port(port), port);
    }

    #[test]
    fn test_free_port_returned_as_is() {
        let port = {
            let listener = TcpListener::bind("0.0.0.0:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(is_port_available_sync(port));
        assert_eq!(available_port(port), port);
    }
}
