pub mod allow_list;
pub mod metrics;
pub mod upstream;

pub use allow_list::EndpointAllowList;
pub use metrics::{get_metrics, init_metrics};
pub use upstream::UpstreamClient;
