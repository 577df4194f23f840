use serde::Deserialize;
use utoipa::ToSchema;

/// 批量操作请求体，`{ "ids": [1, 2, 3] }`
#[derive(Debug, Deserialize, ToSchema)]
pub struct IdsDto {
    pub ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_dto_shape() {
        let dto: IdsDto = serde_json::from_value(serde_json::json!({ "ids": [3, 1, 4] })).unwrap();
        assert_eq!(dto.ids, vec![3, 1, 4]);
    }
}
