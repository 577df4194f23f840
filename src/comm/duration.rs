/// 解析过期时间字符串为秒数
///
/// 支持 `30s` / `15m` / `2h` / `7d` 后缀写法，纯数字按秒处理，
/// 无法解析时返回 None 由调用方回退默认值。
pub fn parse_duration_secs(input: &str) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<i64>() {
        return (secs > 0).then_some(secs);
    }
    let unit = s.chars().last()?;
    let value = &s[..s.len() - unit.len_utf8()];
    let n = value.parse::<i64>().ok()?;
    if n <= 0 {
        return None;
    }
    let factor = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return None,
    };
    Some(n * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_forms() {
        assert_eq!(parse_duration_secs("30s"), Some(30));
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("2h"), Some(7200));
        assert_eq!(parse_duration_secs("1d"), Some(86400));
        assert_eq!(parse_duration_secs("7d"), Some(604800));
    }

    #[test]
    fn test_plain_seconds() {
        assert_eq!(parse_duration_secs("3600"), Some(3600));
        assert_eq!(parse_duration_secs(" 60 "), Some(60));
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("abc"), None);
        assert_eq!(parse_duration_secs("10x"), None);
        assert_eq!(parse_duration_secs("-5m"), None);
        assert_eq!(parse_duration_secs("0d"), None);
    }
}
