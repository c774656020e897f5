use anyhow::{anyhow, Context};

pub const DEFAULT_EXPAND_DEPTH: usize = 3;
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RenderConfig {
    /// Comments shallower than this show their replies until the user hides them
    pub expand_depth: usize,

    /// Comments at this depth or deeper link to their replies instead of
    /// rendering them inline
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            expand_depth: DEFAULT_EXPAND_DEPTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub render: RenderConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> ClientConfig {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        ClientConfig {
            base_url,
            render: RenderConfig::default(),
        }
    }

    /// Reads `AGORA_API_URL`, and optionally `AGORA_EXPAND_DEPTH` and
    /// `AGORA_MAX_DEPTH`, through `var`
    pub fn from_vars<F>(var: F) -> anyhow::Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = var("AGORA_API_URL")
            .ok_or_else(|| anyhow!("AGORA_API_URL must be set"))?;
        let mut config = ClientConfig::new(base_url);
        if let Some(d) = var("AGORA_EXPAND_DEPTH") {
            config.render.expand_depth = d
                .parse()
                .with_context(|| format!("parsing AGORA_EXPAND_DEPTH {d:?}"))?;
        }
        if let Some(d) = var("AGORA_MAX_DEPTH") {
            config.render.max_depth = d
                .parse()
                .with_context(|| format!("parsing AGORA_MAX_DEPTH {d:?}"))?;
        }
        Ok(config)
    }
}
