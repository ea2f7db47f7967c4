/// Alert evaluation for the hazard monitoring service.
///
/// Submodules:
/// - `thresholds` — ordinal risk classification of single measurements.
///
/// Deduplication, dispatch and history live in `monitor` and `history`,
/// which build on the levels computed here.

pub mod thresholds;
