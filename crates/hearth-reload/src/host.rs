//! Dynamic code host
//!
//! The production [`CodeHost`]: each isolated context loads application
//! entry libraries from the configured artifact directories with
//! `libloading` and resolves the exported entry symbol. Old and new
//! application versions coexist because every restart gets a fresh context
//! with its own library handles.

use std::collections::HashMap;
use std::ffi::{CString, c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use hearth_kernel::{CodeContext, CodeError, CodeHost, EntryPoint};
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Exported symbol every application entry library must provide; see
/// [`declare_entry!`](crate::declare_entry).
pub const ENTRY_SYMBOL: &[u8] = b"_hearth_entry";

type EntryFn = unsafe extern "C" fn(argc: c_int, argv: *const *const c_char) -> c_int;

/// A loaded application library.
struct DylibLibrary {
    path: PathBuf,
    library: Library,
    /// File content hash, logged for change diagnostics.
    hash: String,
}

impl DylibLibrary {
    fn load(path: &Path) -> Result<Self, CodeError> {
        let hash = calculate_hash(path)?;

        let library = unsafe {
            Library::new(path).map_err(|e| CodeError::LibraryLoad(e.to_string()))?
        };

        info!(path = ?path, hash = %hash, "Loaded application library");

        Ok(Self {
            path: path.to_path_buf(),
            library,
            hash,
        })
    }

    fn has_entry_symbol(&self) -> bool {
        unsafe { self.library.get::<EntryFn>(ENTRY_SYMBOL).is_ok() }
    }
}

impl Drop for DylibLibrary {
    fn drop(&mut self) {
        debug!(path = ?self.path, "Unloading application library");
    }
}

fn calculate_hash(path: &Path) -> Result<String, CodeError> {
    let contents = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Platform-specific shared-library filename for an entry name.
fn platform_library_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.dll", name)
    } else if cfg!(target_os = "macos") {
        format!("lib{}.dylib", name)
    } else {
        format!("lib{}.so", name)
    }
}

/// One isolated code-loading context backed by dynamic libraries.
pub struct DylibCodeContext {
    generation: String,
    artifact_dirs: Vec<PathBuf>,
    libraries: RwLock<HashMap<PathBuf, Arc<DylibLibrary>>>,
}

impl DylibCodeContext {
    fn new(artifact_dirs: Vec<PathBuf>) -> Self {
        Self {
            generation: uuid::Uuid::now_v7().to_string(),
            artifact_dirs,
            libraries: RwLock::new(HashMap::new()),
        }
    }

    /// Locate the library file for an entry name: a direct path first, then
    /// the artifact directories, then the current directory.
    fn find_library(&self, name: &str) -> Option<PathBuf> {
        let direct_path = PathBuf::from(name);
        if direct_path.is_file() {
            return Some(direct_path);
        }

        let lib_name = platform_library_name(name);

        for dir in &self.artifact_dirs {
            let full_path = dir.join(&lib_name);
            if full_path.is_file() {
                return Some(full_path);
            }
        }

        let current_path = PathBuf::from(&lib_name);
        if current_path.is_file() {
            return Some(current_path);
        }

        None
    }

    fn load_library(&self, path: &Path) -> Result<Arc<DylibLibrary>, CodeError> {
        {
            let libraries = self.libraries.read();
            if let Some(lib) = libraries.get(path) {
                return Ok(lib.clone());
            }
        }

        let library = Arc::new(DylibLibrary::load(path)?);
        self.libraries.write().insert(path.to_path_buf(), library.clone());
        Ok(library)
    }
}

impl CodeContext for DylibCodeContext {
    fn id(&self) -> &str {
        &self.generation
    }

    /// Resolve an entry point. Both a missing library file and a library
    /// without the entry symbol count as "entry point not found" — the
    /// recoverable case the coordinator handles.
    fn load_entry(&self, name: &str) -> Result<Box<dyn EntryPoint>, CodeError> {
        let path = self
            .find_library(name)
            .ok_or_else(|| CodeError::EntryNotFound(name.to_string()))?;

        let library = self.load_library(&path)?;
        if !library.has_entry_symbol() {
            return Err(CodeError::EntryNotFound(name.to_string()));
        }

        Ok(Box::new(DylibEntryPoint { library }))
    }
}

/// An entry point resolved inside a [`DylibCodeContext`]. Holds the library
/// alive for as long as the handle exists.
struct DylibEntryPoint {
    library: Arc<DylibLibrary>,
}

impl EntryPoint for DylibEntryPoint {
    fn invoke(&self, args: &[String]) -> Result<(), CodeError> {
        let c_args: Vec<CString> = args
            .iter()
            .map(|a| CString::new(a.as_str()))
            .collect::<Result<_, _>>()
            .map_err(|e| CodeError::InvokeFailed(format!("invalid argument: {}", e)))?;
        let c_ptrs: Vec<*const c_char> = c_args.iter().map(|a| a.as_ptr()).collect();

        let rc = unsafe {
            let entry: Symbol<EntryFn> = self
                .library
                .library
                .get(ENTRY_SYMBOL)
                .map_err(|e| CodeError::SymbolNotFound(e.to_string()))?;
            entry(c_ptrs.len() as c_int, c_ptrs.as_ptr())
        };

        if rc != 0 {
            return Err(CodeError::InvokeFailed(format!(
                "entry point returned {}",
                rc
            )));
        }
        Ok(())
    }
}

/// Code host loading application entries from shared libraries.
pub struct DylibCodeHost {
    artifact_dirs: Vec<PathBuf>,
    default_context: OnceLock<Arc<dyn CodeContext>>,
}

impl DylibCodeHost {
    pub fn new() -> Self {
        Self {
            artifact_dirs: Vec::new(),
            default_context: OnceLock::new(),
        }
    }

    /// Add a directory to scan for application entry libraries.
    pub fn with_artifact_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.artifact_dirs.push(dir.as_ref().to_path_buf());
        self
    }
}

impl Default for DylibCodeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeHost for DylibCodeHost {
    fn default_context(&self) -> Arc<dyn CodeContext> {
        self.default_context
            .get_or_init(|| Arc::new(DylibCodeContext::new(self.artifact_dirs.clone())))
            .clone()
    }

    fn create_isolated_context(&self) -> Result<Arc<dyn CodeContext>, CodeError> {
        let context = DylibCodeContext::new(self.artifact_dirs.clone());
        debug!(context = %context.generation, "Created isolated code context");
        Ok(Arc::new(context))
    }
}

/// Declare the exported entry point of an application library.
///
/// The wrapped function receives the originally captured process arguments
/// and is re-invoked on every hot restart:
///
/// ```rust,ignore
/// fn run(args: Vec<String>) {
///     // start the application
/// }
///
/// hearth_reload::declare_entry!(run);
/// ```
#[macro_export]
macro_rules! declare_entry {
    ($entry_fn:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _hearth_entry(
            argc: ::std::os::raw::c_int,
            argv: *const *const ::std::os::raw::c_char,
        ) -> ::std::os::raw::c_int {
            let mut args: Vec<String> = Vec::with_capacity(argc as usize);
            if !argv.is_null() {
                for i in 0..argc as isize {
                    let ptr = unsafe { *argv.offset(i) };
                    if ptr.is_null() {
                        continue;
                    }
                    let arg = unsafe { ::std::ffi::CStr::from_ptr(ptr) };
                    args.push(arg.to_string_lossy().into_owned());
                }
            }
            $entry_fn(args);
            0
        }
    };
}
