use serde::Deserialize;

pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const WEB_SEARCH_VERSION: &str = "web_search_20250305";

#[derive(Deserialize, Debug)]
pub struct WebSearchArgs {
    pub query: String,
}
