//! # Usage Anomaly Workspace
//!
//! Umbrella crate over the workspace members.
//!
//! ## Example
//!
//! ```
//! use usage_anomaly_workspace::usage_forecast::registry::product_registry;
//!
//! assert!(product_registry().contains("desktop_global"));
//! ```

pub use forecast_math;
pub use usage_forecast;

/// Versions of the workspace members, in dependency order.
pub fn member_versions() -> [(&'static str, &'static str); 2] {
    [
        ("forecast_math", forecast_math::VERSION),
        (usage_forecast::NAME, usage_forecast::VERSION),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_listed() {
        let versions = member_versions();
        assert_eq!(versions[1].0, "usage_forecast");
        assert!(versions.iter().all(|(_, v)| !v.is_empty()));
    }
}
