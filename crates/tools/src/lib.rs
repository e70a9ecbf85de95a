//! Tools shared by the example agents.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod scrape;
mod tavily;
#[cfg(test)]
mod test_server;
mod weather;

pub use scrape::{ScrapeWebpageParameters, ScrapeWebpageTool};
pub use tavily::{TavilySearchParameters, TavilySearchTool};
pub use weather::{WeatherTool, WeatherToolParameters};
