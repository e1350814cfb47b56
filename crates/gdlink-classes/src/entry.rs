//! The GDExtension entry point
//!
//! The engine calls the library's init symbol once, then `initialize` and
//! `deinitialize` for every initialization level it walks. The [`Engine`] is
//! built at the first level at or after `Scene` and torn down at that same
//! level on the way out.

use crate::engine::Engine;
use crate::error::{Error, Result};
use gdlink_classdb::{ClassDb, ClassRegistrar};
use gdlink_core::boundary::{guard, report};
use gdlink_core::interface::{GetProcAddress, Initialization, LibraryPtr};
use gdlink_core::{logging, Api, ExtensionConfig, InitializationLevel};
use std::ffi::c_void;

/// Environment variable naming a RON config file for the default entry symbol
pub const CONFIG_ENV: &str = "GDLINK_CONFIG";

/// Hook registering the library's own extension classes
pub type RegisterFn = fn(&mut ClassRegistrar, &mut ClassDb<Engine>) -> Result<()>;

struct ExtensionState {
    api: Api,
    config: ExtensionConfig,
    register: RegisterFn,
    registrar: ClassRegistrar,
    engine: Option<Engine>,
    engine_level: Option<InitializationLevel>,
}

impl ExtensionState {
    fn build_engine(&mut self) -> Result<Engine> {
        let register = self.register;
        let registrar = &mut self.registrar;
        Engine::init_with(&self.api, &self.config, |classes| register(registrar, classes))
    }

    fn teardown(&mut self) {
        self.registrar.unregister_all();
        if self.engine.take().is_some() {
            tracing::info!(library = %self.config.library_name, "Engine released");
        }
        self.engine_level = None;
    }
}

/// Config from the file named by `GDLINK_CONFIG`, if the variable is set
pub fn config_from_env() -> Result<Option<ExtensionConfig>> {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return Ok(None);
    };
    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigFile {
        path: path.clone(),
        source,
    })?;
    Ok(Some(ExtensionConfig::from_ron(&source)?))
}

/// Load the interface and fill the engine's initialization record
///
/// Returns 1 on success and 0 when the library cannot be loaded.
///
/// # Safety
/// Must be called from the library's init symbol with the arguments the
/// engine passed to it.
pub unsafe fn init_library(
    get_proc_address: Option<GetProcAddress>,
    library: LibraryPtr,
    r_initialization: *mut Initialization,
    config: ExtensionConfig,
    register: RegisterFn,
) -> u8 {
    logging::init_with_config(config.log_config());

    let Some(get_proc_address) = get_proc_address else {
        tracing::error!("Engine passed no get_proc_address");
        return 0;
    };
    if r_initialization.is_null() {
        tracing::error!("Engine passed no initialization record");
        return 0;
    }
    let api = match Api::load(get_proc_address, library) {
        Ok(api) => api,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load engine interface");
            return 0;
        }
    };

    tracing::info!(
        library = %config.library_name,
        engine = %api.version(),
        minimum_level = ?config.minimum_level,
        "Extension loaded"
    );
    let minimum_level = config.minimum_level;
    let state = Box::new(ExtensionState {
        registrar: ClassRegistrar::new(&api),
        api,
        config,
        register,
        engine: None,
        engine_level: None,
    });
    *r_initialization = Initialization {
        minimum_initialization_level: minimum_level as u32,
        userdata: Box::into_raw(state) as *mut c_void,
        initialize: Some(initialize),
        deinitialize: Some(deinitialize),
    };
    1
}

unsafe extern "C" fn initialize(userdata: *mut c_void, level: u32) {
    if userdata.is_null() {
        return;
    }
    let state = &mut *(userdata as *mut ExtensionState);
    let Some(level) = InitializationLevel::from_raw(level) else {
        return;
    };
    tracing::debug!(?level, "Initializing");
    if level < InitializationLevel::Scene || state.engine_level.is_some() {
        return;
    }

    // One attempt only; a failed build stays failed for the session
    state.engine_level = Some(level);
    let api = state.api.clone();
    match guard(&api, "initialize", || state.build_engine()) {
        Some(Ok(engine)) => state.engine = Some(engine),
        Some(Err(err)) => report(&api, "initialize", &err.to_string()),
        None => {}
    }
}

unsafe extern "C" fn deinitialize(userdata: *mut c_void, level: u32) {
    if userdata.is_null() {
        return;
    }
    let Some(level) = InitializationLevel::from_raw(level) else {
        return;
    };
    tracing::debug!(?level, "Deinitializing");
    let state = &mut *(userdata as *mut ExtensionState);
    let last = level == state.config.minimum_level;
    if state.engine_level == Some(level) || last {
        state.teardown();
    }
    if last {
        drop(Box::from_raw(userdata as *mut ExtensionState));
    }
}

fn register_nothing(_: &mut ClassRegistrar, _: &mut ClassDb<Engine>) -> Result<()> {
    Ok(())
}

/// Entry symbol named in the `.gdextension` file
///
/// Uses the config named by `GDLINK_CONFIG` (or the defaults) and registers
/// only the wrapped engine classes. Libraries with their own classes export
/// their own symbol and call [`init_library`].
///
/// # Safety
/// Called by the engine only.
#[no_mangle]
pub unsafe extern "C" fn gdlink_library_init(
    get_proc_address: Option<GetProcAddress>,
    library: LibraryPtr,
    r_initialization: *mut Initialization,
) -> u8 {
    let (config, config_error) = match config_from_env() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (ExtensionConfig::default(), Some(err)),
    };
    logging::init_with_config(config.log_config());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "Falling back to the default config");
    }
    init_library(get_proc_address, library, r_initialization, config, register_nothing)
}
