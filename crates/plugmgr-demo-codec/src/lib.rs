//! Demo Codec Plugin
//!
//! Serves `encode` and `decode` with the same ROT13 handler, so a host can
//! round-trip text through two independently spawned handlers.
//!
//! Build it and point the CLI at the output directory:
//!
//! ```text
//! cargo build -p plugmgr-demo-codec
//! plugmgr list --dir target/debug
//! ```

use plugmgr_sdk::declare_plugin_identity;

/// Capability served by this plugin. Hosts loading it must use the same trait.
pub trait Codec {
    fn transform(&self, input: &str) -> String;
}

/// ROT13 over ASCII letters; everything else passes through.
#[derive(Debug, Default)]
pub struct Rot13;

impl Codec for Rot13 {
    fn transform(&self, input: &str) -> String {
        input
            .chars()
            .map(|c| match c {
                'a'..='z' => rotate(c, b'a'),
                'A'..='Z' => rotate(c, b'A'),
                _ => c,
            })
            .collect()
    }
}

fn rotate(c: char, base: u8) -> char {
    (((c as u8 - base + 13) % 26) + base) as char
}

declare_plugin_identity! {
    capability: dyn Codec,
    version: (1, 0),
    operations: ["encode", "decode"],
    spawn: || Some(Box::new(Rot13) as Box<dyn Codec>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_rot13_round_trip() {
        let codec = Rot13;
        assert_eq!(codec.transform("Hello, World!"), "Uryyb, Jbeyq!");
        assert_eq!(codec.transform(&codec.transform("plugmgr")), "plugmgr");
    }

    #[test]
    fn test_exported_identity() {
        let identity = unsafe { &*plugmgr_plugin_identity() };
        assert_eq!(identity.major_version, 1);
        assert_eq!(identity.minor_version, 0);

        let mut names = Vec::new();
        unsafe {
            let mut cursor = identity.operations;
            while !(*cursor).is_null() {
                names.push(CStr::from_ptr(*cursor).to_str().unwrap().to_string());
                cursor = cursor.add(1);
            }
        }
        assert_eq!(names, vec!["encode", "decode"]);
    }

    #[test]
    fn test_spawned_handler_round_trips() {
        let identity = unsafe { &*plugmgr_plugin_identity() };
        unsafe {
            let raw = (identity.spawn_handler)();
            assert!(!raw.is_null());
            let codec = &*(raw as *const Box<dyn Codec>);
            assert_eq!(codec.transform("abc"), "nop");
            (identity.destroy_handler)(raw);
        }
    }
}
