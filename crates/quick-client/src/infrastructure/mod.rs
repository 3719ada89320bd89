//! Infrastructure layer for quick-client.
//!
//! Everything that performs I/O lives here:
//!
//! | Module         | Responsibility                                           |
//! |----------------|----------------------------------------------------------|
//! | `http_api`     | `POST /quick` session bootstrap over `reqwest`           |
//! | `guac`         | Display tunnel: instruction codec and WebSocket driver   |
//! | `term_ws`      | WebSocket transport of the terminal message protocol     |
//! | `console`      | Raw-mode console, input reader, surface and presenter    |
//! | `input`        | Key and mouse translation, `Ctrl+]` command prefix       |
//! | `os_clipboard` | Desktop clipboard through `arboard`                      |
//! | `debounce`     | Trailing-edge timer and the debounced resize queue       |
//! | `runner`       | Per-session event loop tying the pieces together         |

pub mod console;
pub mod debounce;
pub mod guac;
pub mod http_api;
pub mod input;
pub mod os_clipboard;
pub mod runner;
pub mod term_ws;

pub use debounce::{Debouncer, ResizeQueue};
pub use guac::GuacTunnel;
pub use http_api::HttpSessionApi;
pub use os_clipboard::OsClipboard;
pub use runner::{run, SessionOutcome};
