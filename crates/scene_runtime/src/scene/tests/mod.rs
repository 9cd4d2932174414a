//! Whole-scene scenarios spanning several modules
