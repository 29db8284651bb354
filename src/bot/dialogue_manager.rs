//! Dialogue Manager module: the wizard's save actions and the reports behind
//! the maintenance commands, independent of Telegram types.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::app::App;
use crate::categories::{FolderKey, FolderKind, SingleShotKind, TwoStageKind};
use crate::clock::week_label;
use crate::errors::DiskResult;
use crate::events::EndResolution;
use crate::local_files::random_suffix;
use crate::pending::{PendingEntry, UserId};
use crate::remote::RemoteDisk;
use crate::stage_files::{normalize_extension, EventNumber, EventSummary, Stage, StageFile};
use crate::wizard::WizardState;
use crate::yandex_disk::{DiskInfo, YandexDisk};

/// A single screenshot stored on the disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSaved {
    pub folder: FolderKey,
    pub file_name: String,
}

/// A stage screenshot stored on the disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSaved {
    pub kind: TwoStageKind,
    pub stage: Stage,
    pub number: EventNumber,
    /// Set for end stages
    pub resolution: Option<EndResolution>,
    /// Number of the already closed event an end replaced
    pub superseded: Option<EventNumber>,
    pub folder: FolderKey,
    pub file_name: String,
}

/// What the stage step shows before the user picks start or end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOverview {
    pub folder: FolderKey,
    pub pending: Option<EventNumber>,
    /// `None` when the folder could not be listed
    pub unfinished: Option<Vec<EventNumber>>,
}

/// Folder resolved for a dialog, pinned to when the dialog began
pub fn dialog_folder(app: &App, user_id: UserId, state: &WizardState, kind: impl Into<FolderKind>) -> FolderKey {
    let base = app.base_path_for(user_id, Some(state));
    FolderKey::resolve(&base, kind, state.started_at)
}

/// `{prefix}_{unix millis}_{random}.{ext}`
pub fn single_shot_file_name(kind: SingleShotKind, extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.{}",
        kind.file_prefix(),
        now.timestamp_millis(),
        random_suffix(),
        normalize_extension(extension)
    )
}

/// Upload a single-screenshot category photo
///
/// The local photo is deleted whether or not the upload succeeds.
pub async fn save_single_shot<D>(
    app: &App,
    disk: &D,
    user_id: UserId,
    kind: SingleShotKind,
    state: &WizardState,
) -> DiskResult<SingleSaved>
where
    D: RemoteDisk + ?Sized,
{
    let folder = dialog_folder(app, user_id, state, kind);
    let file_name = single_shot_file_name(kind, &state.photo.extension, Utc::now());
    let result = disk
        .upload_file(&state.photo.local_path, &folder.file_path(&file_name))
        .await;
    app.discard_photo(state);

    match result {
        Ok(()) => {
            info!(user_id, folder = %folder, file = %file_name, "Saved single screenshot");
            Ok(SingleSaved { folder, file_name })
        }
        Err(e) => {
            error!(user_id, folder = %folder, error = %e, "Failed to save single screenshot");
            Err(e)
        }
    }
}

/// Assign a number for a stage screenshot and upload it as `{n}-{stage}.{ext}`
///
/// A failed start upload releases the pending entry it created. The local
/// photo is deleted either way.
pub async fn save_two_stage<D>(
    app: &App,
    disk: &D,
    user_id: UserId,
    kind: TwoStageKind,
    stage: Stage,
    state: &WizardState,
) -> DiskResult<StageSaved>
where
    D: RemoteDisk + ?Sized,
{
    let folder = dialog_folder(app, user_id, state, kind);
    let folder_path = folder.path();

    let (number, resolution, superseded) = match stage {
        Stage::Start => {
            let number = app
                .events
                .assign_number_for_start(disk, user_id, kind, &folder_path)
                .await;
            (number, None, None)
        }
        Stage::End => {
            let previous = app.events.pending().get(user_id, kind).map(|entry| entry.event_number);
            let assignment = app
                .events
                .assign_number_for_end(disk, user_id, kind, &folder_path)
                .await;
            let superseded = match assignment.resolution {
                EndResolution::SupersededCompleted => previous,
                _ => None,
            };
            (assignment.number, Some(assignment.resolution), superseded)
        }
    };

    let file_name = StageFile::file_name(number, stage, &state.photo.extension);
    let result = disk
        .upload_file(&state.photo.local_path, &folder.file_path(&file_name))
        .await;
    app.discard_photo(state);

    if let Err(e) = result {
        error!(user_id, folder = %folder, number, error = %e, "Failed to save stage screenshot");
        if stage == Stage::Start {
            app.events.release_start(user_id, kind, number).await;
        }
        return Err(e);
    }

    info!(user_id, folder = %folder, file = %file_name, "Saved stage screenshot");
    Ok(StageSaved {
        kind,
        stage,
        number,
        resolution,
        superseded,
        folder,
        file_name,
    })
}

/// Pending number and unfinished events for the stage step
pub async fn stage_overview<D>(
    app: &App,
    disk: Option<&D>,
    user_id: UserId,
    kind: TwoStageKind,
    state: &WizardState,
) -> StageOverview
where
    D: RemoteDisk + ?Sized,
{
    let folder = dialog_folder(app, user_id, state, kind);
    let pending = app.events.pending().get(user_id, kind).map(|entry| entry.event_number);
    let unfinished = match disk {
        Some(disk) => match app.events.list_unfinished(disk, &folder.path()).await {
            Ok(numbers) => Some(numbers),
            Err(e) => {
                warn!(user_id, folder = %folder, error = %e, "Could not list unfinished events");
                None
            }
        },
        None => None,
    };
    StageOverview {
        folder,
        pending,
        unfinished,
    }
}

/// Unfinished events known in memory and found on the disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReport {
    pub memory: Vec<PendingEntry>,
    /// Folders whose listing failed are left out
    pub on_disk: Vec<(TwoStageKind, FolderKey, Vec<EventNumber>)>,
}

impl PendingReport {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.on_disk.iter().all(|(_, _, numbers)| numbers.is_empty())
    }
}

pub async fn pending_report<D>(
    app: &App,
    disk: Option<&D>,
    user_id: UserId,
    now: DateTime<Utc>,
) -> PendingReport
where
    D: RemoteDisk + ?Sized,
{
    let memory = app.events.pending_for_user(user_id);
    let mut on_disk = Vec::new();

    if let Some(disk) = disk {
        let base = app.base_path_for(user_id, None);
        for kind in TwoStageKind::ALL {
            let folder = FolderKey::resolve(&base, kind, now);
            match app.events.list_unfinished(disk, &folder.path()).await {
                Ok(numbers) => on_disk.push((kind, folder, numbers)),
                Err(e) => warn!(user_id, folder = %folder, error = %e, "Skipping folder in pending report"),
            }
        }
    }

    PendingReport { memory, on_disk }
}

/// Summary per two-stage folder of the current week
pub async fn sync_report<D>(
    app: &App,
    disk: &D,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Vec<(FolderKey, DiskResult<EventSummary>)>
where
    D: RemoteDisk + ?Sized,
{
    let base = app.base_path_for(user_id, None);
    let mut report = Vec::new();
    for kind in TwoStageKind::ALL {
        let folder = FolderKey::resolve(&base, kind, now);
        let summary = app.events.summarize(disk, &folder.path()).await;
        report.push((folder, summary));
    }
    report
}

/// Create every category folder of the week containing `now`
///
/// Returns the week path and how many folders failed.
pub async fn init_week_folders<D>(
    app: &App,
    disk: &D,
    user_id: UserId,
    now: DateTime<Utc>,
) -> (String, usize)
where
    D: RemoteDisk + ?Sized,
{
    let base = app.base_path_for(user_id, None);
    let label = week_label(now.with_timezone(&chrono::Local).date_naive());
    let mut failed = 0;
    let mut week_path = String::new();

    for name in FolderKind::all_folder_names() {
        let folder = FolderKey::new(&base, &label, name);
        week_path = folder.week_path();
        if let Err(e) = disk.ensure_path(&folder.path()).await {
            warn!(user_id, folder = %folder, error = %e, "Could not create folder");
            failed += 1;
        }
    }
    (week_path, failed)
}

/// Read disk usage, then create and delete a scratch folder under the base path
pub async fn connection_test(disk: &YandexDisk, base_path: &str, now: DateTime<Utc>) -> DiskResult<DiskInfo> {
    let info = disk.disk_info().await?;
    let probe = format!(
        "{}/test_connection_{}",
        base_path.trim_end_matches('/'),
        now.timestamp_millis()
    );
    disk.ensure_path(&probe).await?;
    disk.delete(&probe).await?;
    Ok(info)
}
