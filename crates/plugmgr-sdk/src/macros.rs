//! Declarative macros for plugin development.

/// Export a plugin identity from a `cdylib`.
///
/// Generates the `#[no_mangle] extern "C"` identity entry point, plus the
/// spawn/destroy functions that follow the handler convention described in
/// [`abi`](crate::abi). The identity is built once per process on first call.
/// A panic inside `spawn` is caught and reported to the host as a spawn
/// failure.
///
/// # Example
///
/// ```rust
/// use plugmgr_sdk::declare_plugin_identity;
///
/// pub trait Codec {
///     fn apply(&self, input: &str) -> String;
/// }
///
/// struct Upper;
///
/// impl Codec for Upper {
///     fn apply(&self, input: &str) -> String {
///         input.to_uppercase()
///     }
/// }
///
/// declare_plugin_identity! {
///     capability: dyn Codec,
///     version: (1, 0),
///     operations: ["upper"],
///     spawn: || Some(Box::new(Upper) as Box<dyn Codec>),
/// }
/// ```
///
/// Use the `fn name;` form to export under a symbol other than
/// [`DEFAULT_IDENTITY_SYMBOL`](crate::abi::DEFAULT_IDENTITY_SYMBOL).
#[macro_export]
macro_rules! declare_plugin_identity {
    (
        $(#[$meta:meta])*
        fn $symbol:ident;
        capability: $cap:ty,
        version: ($major:expr, $minor:expr),
        operations: [$($op:expr),* $(,)?],
        spawn: $spawn:expr $(,)?
    ) => {
        $(#[$meta])*
        #[no_mangle]
        pub extern "C" fn $symbol() -> *const $crate::abi::RawPluginIdentity {
            unsafe extern "C" fn spawn_handler() -> *mut ::std::ffi::c_void {
                let spawn: fn() -> ::std::option::Option<::std::boxed::Box<$cap>> = $spawn;
                match ::std::panic::catch_unwind(spawn) {
                    ::std::result::Result::Ok(::std::option::Option::Some(handler)) => {
                        $crate::abi::handler_into_raw::<$cap>(handler)
                    }
                    _ => ::std::ptr::null_mut(),
                }
            }

            unsafe extern "C" fn destroy_handler(handler: *mut ::std::ffi::c_void) {
                if !handler.is_null() {
                    ::std::mem::drop(unsafe { $crate::abi::handler_from_raw::<$cap>(handler) });
                }
            }

            static IDENTITY: ::std::sync::OnceLock<$crate::abi::PluginIdentityCell> =
                ::std::sync::OnceLock::new();

            IDENTITY
                .get_or_init(|| {
                    $crate::abi::PluginIdentityCell::new(
                        $major,
                        $minor,
                        &[$($op),*],
                        spawn_handler,
                        destroy_handler,
                    )
                })
                .as_raw()
        }
    };
    (
        capability: $cap:ty,
        version: ($major:expr, $minor:expr),
        operations: [$($op:expr),* $(,)?],
        spawn: $spawn:expr $(,)?
    ) => {
        $crate::declare_plugin_identity! {
            fn plugmgr_plugin_identity;
            capability: $cap,
            version: ($major, $minor),
            operations: [$($op),*],
            spawn: $spawn,
        }
    };
}
