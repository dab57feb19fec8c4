//! Request body encoders.
//!
//! Every encoder implements [`RequestBody`]: it names its content type and
//! renders itself to bytes when the request is constructed.
//!
//! ## Submodules
//!
//! - [`json`] - `application/json`
//! - [`form`] - `application/x-www-form-urlencoded`
//! - [`multipart`] - `multipart/form-data` with string and file parts
//! - [`plist`] - property lists, XML or binary
//! - [`data`] - raw bytes with content-type sniffing, and plain text

pub mod data;
pub mod form;
pub mod json;
pub mod multipart;
pub mod plist;

pub use courier_core::RequestBody;
pub use data::{DataBody, TextBody, file_extension, sniff_content_type};
pub use form::FormBody;
pub use json::JsonBody;
pub use multipart::{MultipartBody, MultipartFile, MultipartPart};
pub use self::plist::{PlistFormat, PropertyListBody};
