use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 分页查询参数，current 从 1 开始
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_current() -> u32 {
    1
}
fn default_page_size() -> u32 {
    10
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            current: default_current(),
            page_size: default_page_size(),
        }
    }
}

impl PageQuery {
    /// SQL OFFSET 值，非法 current 按第一页处理
    pub fn offset(&self) -> i64 {
        let current = self.current.max(1);
        (current as i64 - 1) * self.limit()
    }

    /// SQL LIMIT 值，page_size 为 0 时按默认值处理
    pub fn limit(&self) -> i64 {
        if self.page_size == 0 {
            default_page_size() as i64
        } else {
            self.page_size as i64
        }
    }
}

/// 分页元信息
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(query: &PageQuery, total: u64) -> Self {
        let page_size = query.limit() as u32;
        let total_pages = if total == 0 {
            0
        } else {
            ((total + page_size as u64 - 1) / page_size as u64) as u32
        };
        Self {
            current: query.current.max(1),
            page_size,
            total,
            total_pages,
        }
    }
}

/// 分页结果包装
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, query: &PageQuery, total: u64) -> Self {
        Self {
            data,
            pagination: Pagination::new(query, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let q = PageQuery {
            current: 3,
            page_size: 20,
        };
        assert_eq!(q.offset(), 40);
        assert_eq!(q.limit(), 20);
    }

    #[test]
    fn test_zero_values_fall_back() {
        let q = PageQuery {
            current: 0,
            page_size: 0,
        };
        assert_eq!(q.offset(), 0);
        assert_eq!(q.limit(), 10);
    }

    #[test]
    fn test_total_pages_ceil() {
        let q = PageQuery {
            current: 1,
            page_size: 30,
        };
        assert_eq!(Pagination::new(&q, 95).total_pages, 4);
        assert_eq!(Pagination::new(&q, 90).total_pages, 3);
        assert_eq!(Pagination::new(&q, 0).total_pages, 0);
        assert_eq!(Pagination::new(&q, 1).total_pages, 1);
    }
}
