//! HTML-to-block conversion for ServiceNow documentation pages.
//!
//! Converts a page's body HTML into a tree of [`ContentBlock`]s carrying
//! styled [`RichTextRun`]s, within the target's structural limits:
//!
//! 1. [`prepare`] protects literal bracket tokens and collapses menu cascades
//! 2. [`classify`] decides what each DOM node is
//! 3. the segmenter turns inline markup into runs no longer than the run limit
//! 4. [`convert`] walks the document and builds the block tree
//!
//! [`ContentBlock`]: sn2n_shared::ContentBlock
//! [`RichTextRun`]: sn2n_shared::RichTextRun

pub mod canonical;
pub mod classify;
mod context;
mod convert;
pub mod images;
pub mod placeholder;
pub mod preprocess;
mod segment;
mod table;

pub use canonical::{CanonicalOptions, canonical_len, canonicalize, normalize_inline};
pub use classify::{NodeClass, classify, detect_callout, inline_annotations, is_chrome};
pub use context::ConversionStats;
pub use convert::{Conversion, convert, detect_language, exceeds_depth, normalize_language};
pub use images::{ImageResolver, NoImages, UrlImageResolver};
pub use placeholder::{Placeholders, protect};
pub use preprocess::{Prepared, content_root, normalize_menu_cascades, prepare};
pub use segment::{segment_fragment, split_runs, split_text};
