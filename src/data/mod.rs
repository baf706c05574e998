/// Data layer: core types and the streaming table reader.
///
/// Architecture:
/// ```text
///  sensor export (.csv)
///        │
///        ▼
///   ┌────────────┐
///   │ DataSource │  header scan → (time, value) columns, row cursor
///   └────────────┘
///        │  next(descriptor)
///        ▼
///   ┌──────────┐
///   │  Datum   │  (timestamp, value), copied out per row
///   └──────────┘
/// ```

pub mod model;
pub mod source;
