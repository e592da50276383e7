use weft::config::ServerConfig;
use weft::http::response::Response;
use weft::{Request, Server};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = ServerConfig::load()?;
    tracing::info!(listen = %cfg.listen_addr, workers = cfg.workers, "Starting weft");

    let mut server = Server::new(cfg);
    server.route("/health", false, |_: &Request, _: &[String]| {
        Response::ok("ok")
    })?;
    server.route("/echo/(.*)", true, |_: &Request, args: &[String]| {
        Response::ok(args.first().cloned().unwrap_or_default())
    })?;

    server.run()
}
