//! Native field values and their JSON wire encoding.
mod codec;
mod path;
mod types;

pub use codec::{
    CodecOptions, DEFAULT_DATE_PREFIX, DEFAULT_GEOPOINT_PREFIX, DEFAULT_REFERENCE_PREFIX,
    DEFAULT_TIMESTAMP_PREFIX, DateFormat, ValueCodec, global_options, install_options, is_wrapped_date,
    set_date_prefix, set_geopoint_prefix, set_reference_prefix, set_timestamp_prefix,
};
pub use path::{DocumentPath, normalize_collection_path};
pub use types::{FieldValue, GeoPoint, MapValue, Timestamp};
