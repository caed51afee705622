use crate::models::{Resource, TimeWindow};

/// Builds the query string for one call covering `window`.
pub fn construct_params(resource: &Resource, window: &TimeWindow) -> Vec<(String, String)> {
    let (start_ms, end_ms) = window.request_bounds_ms();

    let mut params = vec![("symbol".to_string(), resource.symbol().to_string())];
    if let Resource::Klines { interval, .. } = resource {
        params.push(("interval".to_string(), interval.to_string()));
    }
    params.push(("startTime".to_string(), start_ms.to_string()));
    params.push(("endTime".to_string(), end_ms.to_string()));
    params.push(("limit".to_string(), resource.limit().to_string()));
    params
}
