use clap::ArgMatches;
use std::error::Error;

use youqu_admin::command_registry::{build_app, handle_version_command};
use youqu_admin::route_registry::print_global_routes_info;
use youqu_admin::{init_routes, AppBootstrap, AppConfig};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            handle_server_command(sub_matches).await?;
        }
        Some(("version", _)) => {
            handle_version_command();
        }
        Some(("routes", _)) => {
            init_routes();
            print_global_routes_info();
        }
        _ => {
            // subcommand_required(true) 下不会到达
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn handle_server_command(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    init_routes();

    let host = matches
        .get_one::<String>("host")
        .cloned()
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = matches
        .get_one::<String>("port")
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let workers: usize = matches
        .get_one::<String>("workers")
        .and_then(|w| w.parse().ok())
        .unwrap_or(8);

    let config = AppConfig {
        host,
        port,
        workers: Some(workers),
    };

    AppBootstrap::new().with_config(config).run().await?;
    Ok(())
}
