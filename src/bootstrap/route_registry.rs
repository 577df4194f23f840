use actix_web::web;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::RwLock;

/// 路由配置函数类型
pub type RouteConfigFn = fn(&mut web::ServiceConfig);

/// 路由信息结构
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub name: String,
    pub description: String,
    pub module: String,
    pub config_fn: RouteConfigFn,
}

/// 全局路由注册器
#[derive(Debug)]
pub struct RouteRegistry {
    routes: HashMap<String, RouteInfo>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn register_route(&mut self, route_info: RouteInfo) {
        self.routes.insert(route_info.name.clone(), route_info);
    }

    /// 配置所有路由到 ServiceConfig
    pub fn configure_all_routes(&self, cfg: &mut web::ServiceConfig) {
        for route_info in self.routes.values() {
            (route_info.config_fn)(cfg);
        }
    }

    pub fn get_stats(&self) -> (usize, Vec<String>) {
        let total = self.routes.len();
        let modules: Vec<String> = self
            .routes
            .values()
            .map(|route| route.module.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        (total, modules)
    }

    /// 打印路由信息
    pub fn print_routes_info(&self) {
        println!("路由注册信息:");
        println!("============");

        let mut modules: Vec<String> = self
            .routes
            .values()
            .map(|route| route.module.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        modules.sort();

        for module in modules {
            let mut module_routes: Vec<&RouteInfo> = self
                .routes
                .values()
                .filter(|route| route.module == module)
                .collect();
            module_routes.sort_by(|a, b| a.name.cmp(&b.name));
            println!("模块: {} ({} 个路由)", module, module_routes.len());
            for route in module_routes {
                println!("  - {}: {}", route.name, route.description);
            }
        }

        let (total, _) = self.get_stats();
        println!("总计: {} 个路由", total);
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// 全局路由注册器实例
lazy_static! {
    static ref GLOBAL_ROUTE_REGISTRY: RwLock<RouteRegistry> = RwLock::new(RouteRegistry::new());
}

/// 注册路由到全局注册器
pub fn register_global_route(route_info: RouteInfo) {
    let mut registry = GLOBAL_ROUTE_REGISTRY.write().unwrap();
    registry.register_route(route_info);
}

/// 配置所有全局路由
pub fn configure_global_routes(cfg: &mut web::ServiceConfig) {
    let registry = GLOBAL_ROUTE_REGISTRY.read().unwrap();
    registry.configure_all_routes(cfg);
}

/// 打印全局路由信息
pub fn print_global_routes_info() {
    let registry = GLOBAL_ROUTE_REGISTRY.read().unwrap();
    registry.print_routes_info();
}

/// 便捷宏：注册路由
#[macro_export]
macro_rules! register_route {
    ($name:expr, $description:expr, $module:expr, $config_fn:expr) => {
        $crate::route_registry::register_global_route($crate::route_registry::RouteInfo {
            name: $name.to_string(),
            description: $description.to_string(),
            module: $module.to_string(),
            config_fn: $config_fn,
        });
    };
}

/// 便捷宏：批量注册路由
#[macro_export]
macro_rules! register_routes {
    ($(($name:expr, $description:expr, $module:expr, $config_fn:expr)),* $(,)?) => {
        $(
            $crate::register_route!($name, $description, $module, $config_fn);
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App, HttpResponse};

    fn ping(cfg: &mut web::ServiceConfig) {
        cfg.route("/ping", web::get().to(HttpResponse::Ok));
    }

    #[actix_web::test]
    async fn test_registry_configures_routes() {
        let mut registry = RouteRegistry::new();
        registry.register_route(RouteInfo {
            name: "ping".to_string(),
            description: "连通性测试".to_string(),
            module: "test".to_string(),
            config_fn: ping,
        });

        let (total, modules) = registry.get_stats();
        assert_eq!(total, 1);
        assert_eq!(modules, vec!["test".to_string()]);

        let app = test::init_service(
            App::new().configure(|cfg| registry.configure_all_routes(cfg)),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        assert!(resp.status().is_success());
    }

    #[test]
    fn test_duplicate_name_replaces() {
        let mut registry = RouteRegistry::new();
        for desc in ["第一版", "第二版"] {
            registry.register_route(RouteInfo {
                name: "ping".to_string(),
                description: desc.to_string(),
                module: "test".to_string(),
                config_fn: ping,
            });
        }
        let (total, _) = registry.get_stats();
        assert_eq!(total, 1);
    }
}
