/// Data layer: record types, text loaders, and range selection.
///
/// Architecture:
/// ```text
///  reference.txt   redshift.csv   snr.csv
///        │              │            │
///        ▼              ▼            ▼
///   ┌──────────────────────────────────┐
///   │  loader   tokenize → records      │
///   └──────────────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  align   │  reference id ⊂ computed id
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐         ┌──────────┐
///   │  diff    │ ──────▶ │ diff.txt │ ──▶ loader::load_diff → DiffTable
///   └──────────┘         └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter  │  z / magnitude windows → selected indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
