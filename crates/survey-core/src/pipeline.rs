//! Linear stage pipeline.
//!
//! The stages run in a fixed order, each reading the previous artifact by
//! logical name:
//! 1. **Ingest** (`01_raw`): copy the raw extract into the work directory
//! 2. **Rename** (`02_renamed`): apply the registry's rename plan and drop
//!    excluded variables
//! 3. **Recode** (`03_recoded`): run the recode engine, reconcile tallies
//! 4. **Impute** (`04_imputed`): fill designated variables
//! 5. **Flag** (`05_flagged`): append response-quality flags
//!
//! Outputs are pure functions of their inputs and configuration, so a re-run
//! reproduces each artifact byte for byte.

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, info_span, warn};

use survey_impute::Imputer;
use survey_ingest::{column_names, read_dataset};
use survey_map::{
    RegistryConflict, RenamePlan, UpdateSummary, VariableRegistry, apply_exclusions,
    select_included,
};
use survey_model::ImputationRecord;
use survey_transform::{
    RecodeEngine, RecodeReport, RuleTable, SentinelReuse, review_sentinel_reuse,
};
use survey_validate::{
    FlagDetector, FlagSummary, TallyComparison, TallySnapshot, check_sentinel_elimination, compare,
};

use crate::artifacts::{ArtifactInfo, ArtifactStore, Stage};
use crate::config::{ProjectConfig, RuleNames};
use crate::error::Result;
use crate::journal::Journal;

/// A finished stage: its artifact and the audit document written beside it.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome<A> {
    pub stage: Stage,
    pub artifact: ArtifactInfo,
    pub audit_path: PathBuf,
    pub audit: A,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestAudit {
    pub source: PathBuf,
    pub tally: TallySnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameAudit {
    pub plan: RenamePlan,
    /// Excluded variables removed from the dataset.
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecodeAudit {
    pub report: RecodeReport,
    pub before: TallySnapshot,
    pub after: TallySnapshot,
    pub comparison: TallyComparison,
    pub sentinel_reuse: Vec<SentinelReuse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImputeAudit {
    pub records: Vec<ImputationRecord>,
    pub comparison: TallyComparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlagAudit {
    pub summary: FlagSummary,
}

/// Result of applying exclusion rules to the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ExclusionOutcome {
    pub evaluated_on: String,
    pub updates: Vec<UpdateSummary>,
    pub conflicts: Vec<RegistryConflict>,
    pub excluded_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RulesCheck {
    pub rules: usize,
    pub sentinel_reuse: Vec<SentinelReuse>,
}

/// Every stage of one full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ingest: StageOutcome<IngestAudit>,
    pub rename: StageOutcome<RenameAudit>,
    pub recode: StageOutcome<RecodeAudit>,
    pub impute: StageOutcome<ImputeAudit>,
    pub flag: StageOutcome<FlagAudit>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ProjectConfig,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(config: ProjectConfig) -> Self {
        let store = ArtifactStore::new(config.work_dir());
        Self { config, store }
    }

    pub fn open(config_path: &Path) -> Result<Self> {
        Ok(Self::new(ProjectConfig::load(config_path)?))
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn watched(&self) -> &[String] {
        &self.config.verify.watched_sentinels
    }

    pub fn registry(&self) -> Result<VariableRegistry> {
        Ok(VariableRegistry::load(&self.config.registry_path())?)
    }

    /// The rule table keyed by the names the dataset carries after renaming.
    pub fn rules(&self) -> Result<RuleTable> {
        let table = RuleTable::load(&self.config.rules_path())?;
        match self.config.recode.rule_names {
            RuleNames::Renamed => Ok(table),
            RuleNames::Original => {
                let registry = self.registry()?;
                Ok(table.rekeyed(|name| registry.resolve(name).to_string())?)
            }
        }
    }

    fn finish<A: Serialize>(
        &self,
        stage: Stage,
        frame: &DataFrame,
        audit: A,
    ) -> Result<StageOutcome<A>> {
        let artifact = self.store.write(stage, frame)?;
        let audit_path = self.store.write_audit(stage, &audit)?;
        let inputs = stage.input().map(|s| vec![s.artifact()]).unwrap_or_else(|| {
            vec![self.config.raw_input().display().to_string()]
        });
        let mut journal = Journal::load(self.store.dir())?;
        journal.record(stage.as_str(), stage.ordinal(), inputs, &artifact);
        journal.save(self.store.dir())?;
        info!(
            artifact = %artifact.name,
            rows = artifact.rows,
            columns = artifact.columns,
            "stage complete"
        );
        Ok(StageOutcome {
            stage,
            artifact,
            audit_path,
            audit,
        })
    }

    pub fn ingest(&self) -> Result<StageOutcome<IngestAudit>> {
        let span = info_span!("stage", name = %Stage::Raw);
        let _guard = span.enter();

        let source = self.config.raw_input();
        let frame = read_dataset(&source)?;
        let tally = TallySnapshot::scan(&Stage::Raw.artifact(), &frame, None, self.watched())?;
        tally.reconcile()?;
        self.finish(Stage::Raw, &frame, IngestAudit { source, tally })
    }

    pub fn rename(&self) -> Result<StageOutcome<RenameAudit>> {
        let stage = Stage::Renamed;
        let span = info_span!("stage", name = %stage);
        let _guard = span.enter();

        let input = self.store.read_input(stage, Stage::Raw)?;
        let registry = self.registry()?;
        let plan = registry.rename_plan(&column_names(&input))?;
        let renamed = plan.apply(&input)?;
        let (frame, dropped) = select_included(&registry, &renamed)?;
        info!(
            renamed = plan.renamed_count(),
            absent = plan.absent.len(),
            dropped = dropped.len(),
            "rename plan applied"
        );
        self.finish(stage, &frame, RenameAudit { plan, dropped })
    }

    pub fn recode(&self) -> Result<StageOutcome<RecodeAudit>> {
        let stage = Stage::Recoded;
        let span = info_span!("stage", name = %stage);
        let _guard = span.enter();

        let input = self.store.read_input(stage, Stage::Renamed)?;
        let rules = self.rules()?;
        let sentinel_reuse = review_sentinel_reuse(&rules);

        let before = TallySnapshot::scan(
            &Stage::Renamed.artifact(),
            &input,
            Some(&rules),
            self.watched(),
        )?;
        before.reconcile()?;

        let outcome = RecodeEngine::new(&rules, self.config.recode.mode).recode(&input)?;
        let after = TallySnapshot::scan(&stage.artifact(), &outcome.frame, None, self.watched())?;
        after.reconcile()?;
        after.reconcile_with(&outcome.report)?;
        check_sentinel_elimination(&outcome.frame, &rules)?;

        let comparison = compare(&before, &after);
        let audit = RecodeAudit {
            report: outcome.report,
            before,
            after,
            comparison,
            sentinel_reuse,
        };
        self.finish(stage, &outcome.frame, audit)
    }

    pub fn impute(&self) -> Result<StageOutcome<ImputeAudit>> {
        let stage = Stage::Imputed;
        let span = info_span!("stage", name = %stage);
        let _guard = span.enter();

        let input = self.store.read_input(stage, Stage::Recoded)?;
        let rules = self.rules()?;
        let before = TallySnapshot::scan(&Stage::Recoded.artifact(), &input, None, self.watched())?;
        let run = Imputer::new(&rules, self.config.id_column())
            .impute_all(&input, &self.config.imputations)?;
        for failed in run.failed() {
            warn!(variable = %failed.variable_name, "imputation left variable unresolved");
        }
        let after = TallySnapshot::scan(&stage.artifact(), &run.frame, None, self.watched())?;
        after.reconcile()?;
        let audit = ImputeAudit {
            comparison: compare(&before, &after),
            records: run.records,
        };
        self.finish(stage, &run.frame, audit)
    }

    pub fn flag(&self) -> Result<StageOutcome<FlagAudit>> {
        let stage = Stage::Flagged;
        let span = info_span!("stage", name = %stage);
        let _guard = span.enter();

        let input = self.store.read_input(stage, Stage::Imputed)?;
        let detector =
            FlagDetector::new(self.config.blocks.clone(), self.config.consistency.clone())?;
        let outcome = detector.detect(&input)?;
        self.finish(stage, &outcome.frame, FlagAudit {
            summary: outcome.summary,
        })
    }

    /// Run every stage in order, stopping at the first error.
    pub fn run(&self) -> Result<RunSummary> {
        Ok(RunSummary {
            ingest: self.ingest()?,
            rename: self.rename()?,
            recode: self.recode()?,
            impute: self.impute()?,
            flag: self.flag()?,
        })
    }

    /// Tally an existing artifact without changing anything.
    pub fn tally(&self, stage: Stage) -> Result<TallySnapshot> {
        let frame = self.store.read(stage)?;
        let snapshot = TallySnapshot::scan(&stage.artifact(), &frame, None, self.watched())?;
        snapshot.reconcile()?;
        Ok(snapshot)
    }

    /// Evaluate the configured exclusion rules on an artifact and persist the
    /// updated registry.
    pub fn exclude(&self, stage: Stage) -> Result<ExclusionOutcome> {
        let span = info_span!("registry_exclude", artifact = %stage);
        let _guard = span.enter();

        let frame = self.store.read(stage)?;
        let mut registry = self.registry()?;
        let updates = apply_exclusions(&mut registry, &self.config.exclusions, &frame)?;
        registry.save(&self.config.registry_path())?;
        info!(
            rules = updates.len(),
            conflicts = registry.conflicts().len(),
            excluded = registry.excluded_count(),
            "registry updated"
        );
        Ok(ExclusionOutcome {
            evaluated_on: stage.artifact(),
            updates,
            conflicts: registry.conflicts().to_vec(),
            excluded_total: registry.excluded_count(),
        })
    }

    /// Load and validate the rule table without touching any artifact.
    pub fn check_rules(&self) -> Result<RulesCheck> {
        let rules = self.rules()?;
        Ok(RulesCheck {
            rules: rules.len(),
            sentinel_reuse: review_sentinel_reuse(&rules),
        })
    }
}
