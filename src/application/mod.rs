// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Workflow coordination only:
//   - no tensor code (Layer 5)
//   - no argument parsing (Layer 1)
//   - no direct file formats (Layers 4 and 6)
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Wiring for a whole run: config, datasets, model, checkpoints
pub mod train_use_case;

// Epoch loop, validation, best-model tracking
pub mod training_loop;
