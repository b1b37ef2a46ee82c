use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use foundation::tile::TileScheme;

#[derive(Parser, Debug, Clone)]
#[command(name = "maproom-server", about = "Serve a map dashboard: layout, callbacks and computed tiles")]
pub struct Config {
    #[arg(long, env = "MAPROOM_ADDR", default_value = "127.0.0.1:8050")]
    pub addr: SocketAddr,

    /// URL prefix every route is mounted under.
    #[arg(long, env = "MAPROOM_PREFIX", default_value = "monthly")]
    pub prefix: String,

    #[arg(long, env = "MAPROOM_TILE_SIZE", default_value_t = 256)]
    pub tile_size: u32,

    /// `geographic` (EPSG:4326) or `web-mercator` (EPSG:3857).
    #[arg(long, env = "MAPROOM_TILE_SCHEME", default_value = "geographic", value_parser = parse_scheme)]
    pub tile_scheme: TileScheme,

    #[arg(long, env = "MAPROOM_TILE_TIMEOUT_MS", default_value_t = 10_000)]
    pub tile_timeout_ms: u64,

    /// Open views beyond this are refused until one closes or idles out.
    #[arg(long, env = "MAPROOM_MAX_VIEWS", default_value_t = 1024)]
    pub max_views: usize,

    #[arg(long, env = "MAPROOM_VIEW_IDLE_SECS", default_value_t = 1800)]
    pub view_idle_secs: u64,

    /// JSON grid file; a synthetic dataset is generated when unset.
    #[arg(long, env = "MAPROOM_DATA")]
    pub data: Option<PathBuf>,
}

impl Config {
    pub fn tile_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_timeout_ms)
    }

    pub fn view_idle(&self) -> Duration {
        Duration::from_secs(self.view_idle_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8050)),
            prefix: "monthly".to_string(),
            tile_size: 256,
            tile_scheme: TileScheme::Geographic,
            tile_timeout_ms: 10_000,
            max_views: 1024,
            view_idle_secs: 1800,
            data: None,
        }
    }
}

fn parse_scheme(raw: &str) -> Result<TileScheme, String> {
    TileScheme::parse(raw).ok_or_else(|| format!("unknown tile scheme `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::Config;
    use clap::Parser;
    use foundation::tile::TileScheme;

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "maproom-server",
            "--prefix",
            "seasonal",
            "--tile-scheme",
            "epsg:3857",
            "--tile-timeout-ms",
            "250",
            "--max-views",
            "8",
        ])
        .unwrap();
        assert_eq!(cfg.prefix, "seasonal");
        assert_eq!(cfg.tile_scheme, TileScheme::WebMercator);
        assert_eq!(cfg.tile_timeout().as_millis(), 250);
        assert_eq!(cfg.max_views, 8);
        assert_eq!(cfg.view_idle().as_secs(), 1800);
        assert_eq!(cfg.tile_size, Config::default().tile_size);
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(Config::try_parse_from(["maproom-server", "--tile-scheme", "polar"]).is_err());
    }
}
