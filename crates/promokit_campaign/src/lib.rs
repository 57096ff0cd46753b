//! `promokit_campaign`:
//! Campaign wizard core: profiles, stage sequencing and phase handlers on
//! top of `promokit_io_xlsx`.
//!
//! - `conf`         : date formats, offsets, sheet roles, mapping keys, form cells
//! - `error`        : `EnumCampaignError`
//! - `profile`      : template profiles and the profile catalog
//! - `dates`        : date windows, LY/LLY derivation, sub-phase shifts
//! - `fields`       : typed per-tab field records
//! - `sql`          : SQL placeholder rule table and tuple formatting
//! - `results`      : pasted-result tokenizing
//! - `article`      : CSV/XLSX uploads and article lists
//! - `request_form` : seed values from a request form
//! - `session`      : loaded template plus touched-sheet tracking
//! - `handler`      : `PhaseHandler` trait, recap and multi-phase handlers
//! - `workflow`     : `CampaignWorkflow`, the stage machine
pub mod article;
pub mod conf;
pub mod dates;
pub mod error;
pub mod fields;
pub mod handler;
pub mod profile;
pub mod request_form;
pub mod results;
pub mod session;
pub mod sql;
pub mod workflow;

pub use article::{ArticleList, EnumUploadFormat, EnumYearLabel, SpecUpload, list_upload_sheets};
pub use dates::{SpecCampaignDates, SpecDateInput, SpecDateWindow, SpecFormattedDates};
pub use error::{CampaignResult, EnumCampaignError};
pub use fields::{SpecFormDefaults, SpecTabContext, SpecTabFields};
pub use handler::{
    EnumSubPhase, MultiPhaseHandler, PhaseHandler, RecapHandler, SpecPhaseContext,
    SpecPhaseInput, build_handler,
};
pub use profile::{
    EnumArticlePolicy, EnumHandlerKind, EnumSheetRef, EnumTupleSource, SpecProfileCatalog,
    SpecTemplateProfile,
};
pub use request_form::{SpecRequestForm, SpecSeedValues, extract_request_form};
pub use session::SpecWorkbookSession;
pub use sql::{SpecRenderedSql, format_sql_tuple, render_sql_template};
pub use workflow::{CampaignWorkflow, EnumWorkflowStage, SpecDownload};
