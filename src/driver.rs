//! Mutant enumeration and materialization.
//!
//! Every mutant is generated from scratch: its own tree snapshot, rewrite
//! buffer and one fresh ledger per mutator. A failure aborts that mutant only.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::error::MutantError;
use crate::mutators::Ledger;
use crate::operator::MutationOperator;
use crate::rewrite::RewriteBuffer;
use crate::syntax::SyntaxTree;

/// One input file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub file_name: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceUnit {
            file_name: file_name.into(),
            text: text.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mutant.rs".to_string());
        Ok(SourceUnit { file_name, text })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutantKind {
    /// Every mutator of a composite operator, applied together.
    Joint,
    /// One accepted match of one mutator.
    Single { mutator: usize, binding: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMutant {
    pub index: usize,
    pub kind: MutantKind,
    /// Line of the matched site, for single mutants.
    pub line: Option<u32>,
}

/// The mutants one operator yields on one unit.
#[derive(Debug, Clone)]
pub struct MutationPlan {
    operator: String,
    mutants: Vec<PlannedMutant>,
}

impl MutationPlan {
    pub fn build(operator: &MutationOperator, tree: &SyntaxTree) -> Self {
        let per_mutator: Vec<_> = operator.mutators().iter().map(|m| m.collect(tree)).collect();

        let mutants = if operator.is_composite() {
            if per_mutator.iter().all(Vec::is_empty) {
                Vec::new()
            } else {
                vec![PlannedMutant {
                    index: 0,
                    kind: MutantKind::Joint,
                    line: None,
                }]
            }
        } else {
            per_mutator
                .iter()
                .enumerate()
                .flat_map(|(m, bindings)| {
                    bindings.iter().enumerate().map(move |(b, binding)| (m, b, binding))
                })
                .enumerate()
                .map(|(index, (mutator, binding, found))| PlannedMutant {
                    index,
                    kind: MutantKind::Single { mutator, binding },
                    line: found.primary().map(|n| tree.line_of(n)),
                })
                .collect()
        };
        debug!(operator = operator.name(), mutants = mutants.len(), "plan built");
        MutationPlan {
            operator: operator.name().to_string(),
            mutants,
        }
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn mutants(&self) -> &[PlannedMutant] {
        &self.mutants
    }

    pub fn len(&self) -> usize {
        self.mutants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutants.is_empty()
    }

    /// Mutants to generate. An out-of-range forced index falls back to a
    /// random pick.
    pub fn select<R: Rng>(&self, selection: Selection, rng: &mut R) -> Vec<&PlannedMutant> {
        match selection {
            Selection::All => self.mutants.iter().collect(),
            Selection::Index(i) => match self.mutants.get(i) {
                Some(m) => vec![m],
                None => {
                    debug!(index = i, count = self.mutants.len(), "forced index out of range");
                    self.mutants.choose(rng).into_iter().collect()
                }
            },
            Selection::Sample(n) => {
                let mut picked: Vec<_> = self.mutants.choose_multiple(rng, n).collect();
                picked.sort_by_key(|m| m.index);
                picked
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    Index(usize),
    Sample(usize),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Re-format the mutant with prettyplease when it still parses.
    pub pretty: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutantOutcome {
    pub operator: String,
    pub index: usize,
    pub dir: PathBuf,
    /// Bindings mutated across all mutators.
    pub applied: usize,
    pub records: usize,
}

pub fn mutant_dir(output_dir: &Path, operator: &str, index: usize) -> PathBuf {
    output_dir.join(operator).join(index.to_string())
}

/// Applies one planned mutant and persists it: reports first, then the
/// rewritten source.
pub fn generate_mutant(
    unit: &SourceUnit,
    operator: &MutationOperator,
    planned: &PlannedMutant,
    output_dir: &Path,
    options: GenerateOptions,
) -> Result<MutantOutcome, MutantError> {
    let index = planned.index;
    let _span = info_span!("mutant", operator = operator.name(), index).entered();
    let mutate_err = |source| MutantError::Mutate {
        operator: operator.name().to_string(),
        index,
        source,
    };

    let tree = SyntaxTree::parse_file(&unit.text).map_err(|source| MutantError::FrontEnd {
        operator: operator.name().to_string(),
        source,
    })?;
    let mut rw = RewriteBuffer::new(tree.text());
    let mut ledgers: Vec<Ledger> = operator.mutators().iter().map(|_| Ledger::new()).collect();

    let mut applied = 0;
    for (i, (mutator, ledger)) in operator.mutators().iter().zip(ledgers.iter_mut()).enumerate() {
        applied += match planned.kind {
            MutantKind::Joint => mutator.run(&tree, &mut rw, ledger).map_err(mutate_err)?,
            MutantKind::Single { mutator: m, binding } if m == i => mutator
                .run_selected(&tree, &mut rw, ledger, Some(binding))
                .map_err(mutate_err)?,
            MutantKind::Single { .. } => 0,
        };
    }
    let records: usize = ledgers.iter().map(Ledger::len).sum();

    // every touched ledger is resolved before anything reaches the disk
    let mut resolved = Vec::new();
    for (i, (mutator, ledger)) in operator.mutators().iter().zip(ledgers.iter_mut()).enumerate() {
        let touched = match planned.kind {
            MutantKind::Joint => true,
            MutantKind::Single { mutator: m, .. } => m == i,
        };
        if !touched {
            continue;
        }
        let rows = mutator.finalize(ledger);
        if !ledger.is_empty() {
            return Err(MutantError::DirtyLedger {
                operator: operator.name().to_string(),
                index,
                mutator: mutator.name().to_string(),
            });
        }
        resolved.push((mutator, rows));
    }

    let dir = mutant_dir(output_dir, operator.name(), index);
    let fresh = !dir.exists();
    fs::create_dir_all(&dir).map_err(|source| MutantError::Io {
        path: dir.clone(),
        source,
    })?;

    for (mutator, rows) in &resolved {
        if let Err(source) = mutator.write_report(&dir, rows) {
            if fresh {
                if let Err(e) = fs::remove_dir_all(&dir) {
                    warn!(dir = %dir.display(), error = %e, "could not remove incomplete mutant");
                }
            }
            return Err(MutantError::Report {
                operator: operator.name().to_string(),
                index,
                source,
            });
        }
    }

    let rendered = rw.render();
    let text = if options.pretty { format_source(rendered) } else { rendered };
    let path = dir.join(&unit.file_name);
    fs::write(&path, text).map_err(|source| MutantError::Io { path, source })?;

    info!(applied, records, dir = %dir.display(), "mutant written");
    Ok(MutantOutcome {
        operator: operator.name().to_string(),
        index,
        dir,
        applied,
        records,
    })
}

/// Pretty-prints `source` if it parses. prettyplease can panic on syntax it
/// does not support yet; the raw text is kept then.
pub fn format_source(source: String) -> String {
    let Ok(file) = syn::parse_file(&source) else {
        return source;
    };
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let formatted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| prettyplease::unparse(&file)));
    std::panic::set_hook(prev_hook);
    match formatted {
        Ok(s) => s,
        Err(_) => {
            warn!("prettyplease panicked; keeping unformatted mutant");
            source
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OperatorSummary {
    pub operator: String,
    pub planned: usize,
    pub generated: Vec<MutantOutcome>,
    pub failed: Vec<String>,
}

/// Plans, selects and generates the mutants of one operator, skipping the
/// ones that fail.
pub fn run_operator<R: Rng>(
    unit: &SourceUnit,
    operator: &MutationOperator,
    output_dir: &Path,
    selection: Selection,
    options: GenerateOptions,
    rng: &mut R,
) -> Result<OperatorSummary, MutantError> {
    let tree = SyntaxTree::parse_file(&unit.text).map_err(|source| MutantError::FrontEnd {
        operator: operator.name().to_string(),
        source,
    })?;
    let plan = MutationPlan::build(operator, &tree);
    let mut summary = OperatorSummary {
        operator: operator.name().to_string(),
        planned: plan.len(),
        ..Default::default()
    };
    for planned in plan.select(selection, rng) {
        match generate_mutant(unit, operator, planned, output_dir, options) {
            Ok(outcome) => summary.generated.push(outcome),
            Err(e) => {
                warn!(error = %e, "mutant skipped");
                summary.failed.push(e.to_string());
            }
        }
    }
    Ok(summary)
}
