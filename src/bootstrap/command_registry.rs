use clap::{Arg, Command};

/// 构建命令行应用
pub fn build_app() -> Command {
    Command::new("youqu-admin")
        .version(env!("CARGO_PKG_VERSION"))
        .about("多租户后台管理 API 服务")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("server")
                .about("启动 Web 服务器")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("设置服务器主机地址")
                        .default_value("0.0.0.0"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("设置服务器端口")
                        .default_value("3000"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("WORKERS")
                        .help("设置工作线程数")
                        .default_value("8"),
                ),
        )
        .subcommand(Command::new("version").about("显示版本信息"))
        .subcommand(Command::new("routes").about("打印已注册的路由"))
}

/// 显示版本信息
pub fn handle_version_command() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}
