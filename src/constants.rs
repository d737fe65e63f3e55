pub const STREAM_KIND: &str = "Stream";
pub const EVENT_KIND: &str = "Event";

pub const KIND_FIELD: &str = "type";
pub const STREAM_ID_FIELD: &str = "streamId";

pub const DEFAULT_CONTAINER_NAME: &str = "Events";
