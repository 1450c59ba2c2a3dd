//! The export session.
//!
//! [`ModuleSerializer`] owns everything one export mutates: the type
//! uniquer, the converted-type set, the per-qualifier printers and the
//! constant table. Records go to the writer in a fixed order:
//!
//! 1. `extra/<name>` for caller files, then non-colliding hook files
//! 2. the `data` archive (module state)
//! 3. `code/<qualifier>.py` and its `.debug_pkl` for every reachable named type
//! 4. the `constants` archive
//! 5. `bytecode`, `mobile_debug` and `metadata` when bytecode is requested
//!
//! and finally the container's minimum version is raised to what the
//! generated sources need.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use mobex_ir::{Module, TypeId, Value};
use mobex_lower::lower_module_default;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bytecode::{bytecode_archive, debug_archive};
use crate::dedup::{deduplicate_constants, ConstantEquivalence, ConstantPool};
use crate::pickle::{pickle_ranges, Pickler};
use crate::printer::{ConstantTable, PrintContext, SourcePrinter};
use crate::version::{should_compress, BASE_FILE_FORMAT_VERSION};
use crate::{ExportError, RecordWriter, TypeNameUniquer};

/// Extra files keyed by name, written as `extra/<name>`.
pub type ExtraFiles = BTreeMap<String, Vec<u8>>;

/// Set once the extra-file collision warning has been logged.
static EXTRA_FILE_COLLISION_WARNED: AtomicBool = AtomicBool::new(false);

/// What an export produces besides the source archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Write `bytecode` (and `metadata`) archives.
    pub bytecode: bool,
    /// Also write `mobile_debug`. Only meaningful with `bytecode`.
    pub debug_info: bool,
    pub constant_equivalence: ConstantEquivalence,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            bytecode: true,
            debug_info: false,
            constant_equivalence: ConstantEquivalence::default(),
        }
    }
}

/// Caller-supplied callbacks consulted during one export.
#[derive(Clone, Copy, Default)]
pub struct ExportHooks<'a> {
    /// More extra files. Names the caller already supplied are skipped.
    pub extra_files: Option<&'a dyn Fn(&Module) -> ExtraFiles>,
    /// Produces the `metadata` archive from the merged extra files. Nothing
    /// is written when it returns `None` or an empty value.
    pub mobile_info: Option<&'a dyn Fn(&Module, &ExtraFiles) -> Option<Value>>,
}

/// Summary of a finished export.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Names of the functions in the `bytecode` archive, in order.
    pub functions: Vec<String>,
    /// Hook extra files dropped because the caller supplied the same name.
    pub skipped_extra_files: Vec<String>,
    /// Minimum container version the generated sources require.
    pub min_version: u64,
    /// Every record written, in write order.
    pub records: Vec<String>,
}

/// One export of one module into one writer.
pub struct ModuleSerializer<'a, W: RecordWriter + ?Sized> {
    module: &'a Module,
    writer: &'a mut W,
    options: ExportOptions,
    namer: TypeNameUniquer,
    constants: ConstantTable,
    converted: FxHashSet<TypeId>,
    pending: VecDeque<TypeId>,
    /// Printers in creation order, with their qualifier.
    printers: Vec<(String, SourcePrinter)>,
    printer_index: FxHashMap<String, usize>,
    report: ExportReport,
}

impl<'a, W: RecordWriter + ?Sized> ModuleSerializer<'a, W> {
    pub fn new(module: &'a Module, writer: &'a mut W, options: ExportOptions) -> Self {
        Self {
            module,
            writer,
            options,
            namer: TypeNameUniquer::new(),
            constants: ConstantTable::new(),
            converted: FxHashSet::default(),
            pending: VecDeque::new(),
            printers: Vec::new(),
            printer_index: FxHashMap::default(),
            report: ExportReport::default(),
        }
    }

    /// Run the whole export.
    pub fn serialize(
        mut self,
        extra_files: &ExtraFiles,
        hooks: ExportHooks<'_>,
    ) -> Result<ExportReport, ExportError> {
        let module = self.module;
        let hook_files = hooks
            .extra_files
            .map(|hook| hook(module))
            .unwrap_or_default();
        self.write_extra_files(extra_files, &hook_files)?;

        let classes = self.write_archive("data", &Value::Object(Rc::clone(module.object())))?;
        self.pending.extend(classes);

        self.write_code()?;

        let constants = Value::Tuple(self.constants.values().to_vec());
        self.write_archive("constants", &constants)?;

        if self.options.bytecode {
            self.write_bytecode()?;
            self.write_mobile_metadata(hooks, extra_files, hook_files)?;
        }

        let mut min_version = BASE_FILE_FORMAT_VERSION;
        for (_, printer) in &self.printers {
            self.writer.set_min_version(printer.min_version());
            min_version = min_version.max(printer.min_version());
        }
        self.report.min_version = min_version;
        tracing::debug!(
            module = %module.type_name(),
            records = self.report.records.len(),
            min_version,
            "export finished"
        );
        Ok(self.report)
    }

    fn write_record(&mut self, name: &str, data: &[u8], compress: bool) -> Result<(), ExportError> {
        self.writer.write_record(name, data, compress)?;
        self.report.records.push(name.to_owned());
        Ok(())
    }

    // ── Extra files ─────────────────────────────────────────────────

    fn write_extra_files(
        &mut self,
        extra_files: &ExtraFiles,
        hook_files: &ExtraFiles,
    ) -> Result<(), ExportError> {
        for (name, data) in extra_files {
            self.write_record(&format!("extra/{name}"), data, false)?;
        }
        for (name, data) in hook_files {
            if extra_files.contains_key(name) {
                if !EXTRA_FILE_COLLISION_WARNED.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        file = %name,
                        "an extra files hook attempted to write a file already supplied by the \
                         caller; it will be skipped (this warning appears once per process)"
                    );
                }
                self.report.skipped_extra_files.push(name.clone());
                continue;
            }
            self.write_record(&format!("extra/{name}"), data, false)?;
        }
        Ok(())
    }

    // ── Pickled archives ────────────────────────────────────────────

    /// Write `value` as `<name>.pkl` preceded by its tensors as
    /// `<name>/<i>`. Returns the class types met while pickling.
    fn write_archive(&mut self, name: &str, value: &Value) -> Result<Vec<TypeId>, ExportError> {
        let archive = Pickler::new(self.module.pool(), &mut self.namer).finish(value)?;
        for (i, tensor) in archive.tensors.iter().enumerate() {
            self.write_record(&format!("{name}/{i}"), tensor.bytes(), false)?;
        }
        self.write_record(&format!("{name}.pkl"), &archive.bytes, false)?;
        tracing::debug!(
            archive = name,
            tensors = archive.tensors.len(),
            bytes = archive.bytes.len(),
            "wrote archive"
        );
        Ok(archive.class_types)
    }

    // ── Generated source ────────────────────────────────────────────

    fn write_code(&mut self) -> Result<(), ExportError> {
        self.pending.push_back(self.module.type_id());
        while let Some(ty) = self.pending.pop_front() {
            self.convert_named_type(ty)?;
        }

        let printers = std::mem::take(&mut self.printers);
        for (qualifier, printer) in &printers {
            let path = format!("code/{}.py", qualifier.replace('.', "/"));
            let source = printer.text().as_bytes();
            self.write_record(&path, source, should_compress(source.len()))?;

            let ranges = pickle_ranges(printer.ranges())?;
            self.write_record(
                &format!("{path}.debug_pkl"),
                &ranges,
                should_compress(ranges.len()),
            )?;
        }
        self.printers = printers;
        Ok(())
    }

    fn convert_named_type(&mut self, ty: TypeId) -> Result<(), ExportError> {
        let pool = self.module.pool();
        if !pool.is_named(ty) || !self.converted.insert(ty) {
            return Ok(());
        }
        let qualifier = self.namer.unique_name(pool, ty).prefix();
        let index = match self.printer_index.get(&qualifier) {
            Some(&index) => index,
            None => {
                self.printers.push((qualifier.clone(), SourcePrinter::new()));
                self.printer_index.insert(qualifier, self.printers.len() - 1);
                self.printers.len() - 1
            }
        };

        let mut discovered = Vec::new();
        let mut ctx = PrintContext {
            pool,
            namer: &mut self.namer,
            constants: &mut self.constants,
            discovered: &mut discovered,
        };
        self.printers[index].1.print_named_type(ty, &mut ctx)?;
        self.pending.extend(
            discovered
                .into_iter()
                .filter(|found| !self.converted.contains(found)),
        );
        Ok(())
    }

    // ── Bytecode ────────────────────────────────────────────────────

    fn write_bytecode(&mut self) -> Result<(), ExportError> {
        let mut lowered = lower_module_default(self.module, self.options.debug_info)?;
        let pool = ConstantPool::new(self.options.constant_equivalence, self.constants.values());
        deduplicate_constants(&mut lowered.functions, &pool);

        self.write_archive("bytecode", &bytecode_archive(&lowered.functions))?;
        if self.options.debug_info {
            self.write_archive("mobile_debug", &debug_archive(&lowered.debug))?;
        }
        self.report.functions = lowered
            .functions
            .into_iter()
            .map(|function| function.name)
            .collect();
        Ok(())
    }

    fn write_mobile_metadata(
        &mut self,
        hooks: ExportHooks<'_>,
        extra_files: &ExtraFiles,
        hook_files: ExtraFiles,
    ) -> Result<(), ExportError> {
        let Some(convert) = hooks.mobile_info else {
            return Ok(());
        };
        let mut merged = extra_files.clone();
        for (name, data) in hook_files {
            merged.entry(name).or_insert(data);
        }
        match convert(self.module, &merged) {
            Some(content) if !content.is_empty() => {
                self.write_archive("metadata", &content)?;
            }
            _ => tracing::debug!("mobile info converter produced nothing"),
        }
        Ok(())
    }
}

/// Export `module` into `writer`.
///
/// On error the records already written are incomplete and the container
/// must be discarded.
pub fn export_module<W: RecordWriter + ?Sized>(
    module: &Module,
    writer: &mut W,
    extra_files: &ExtraFiles,
    options: &ExportOptions,
    hooks: ExportHooks<'_>,
) -> Result<ExportReport, ExportError> {
    ModuleSerializer::new(module, writer, *options).serialize(extra_files, hooks)
}

/// Sorted distinct operator names (`name` or `name.overload`) used by the
/// module's exported functions.
pub fn export_operator_names(module: &Module) -> Result<BTreeSet<String>, ExportError> {
    Ok(lower_module_default(module, false)?.operator_names())
}
