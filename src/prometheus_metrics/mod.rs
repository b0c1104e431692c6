pub mod bespoke;

use prometheus::Registry;

pub const NAMESPACE: &str = "lagtrace";

pub const LABEL_KIND: &str = "kind";
pub const LABEL_GROUP: &str = "group";
pub const LABEL_TOPIC: &str = "topic";
pub const LABEL_PARTITION: &str = "partition";

pub fn init() -> Registry {
    Registry::new_custom(Some(NAMESPACE.to_string()), None)
        .expect("Unable to create a Prometheus Metrics Registry")
}
