use rand::Rng;

/// 生成 n 个随机字节的十六进制字符串（长度为 2n）
pub fn hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(buf.as_mut_slice());
    hex::encode(buf)
}

/// 生成指定长度的数字验证码
pub fn numeric_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// 生成带前缀的一次性令牌，如 `captcha_{毫秒时间戳}_{hex16}`
pub fn token_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        hex(8)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_length_and_charset() {
        let code = hex(3);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_numeric_code() {
        let code = numeric_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_token_id_shape() {
        let token = token_id("captcha");
        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "captcha");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 16);
    }
}
