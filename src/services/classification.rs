// src/services/classification.rs

use crate::models::reference::{Classification, NamedRef, ReferenceKind, ResolvedInfo};
use crate::store::{ReferenceData, StoreResult};

async fn named<R>(refs: &R, kind: ReferenceKind, id: Option<i64>) -> StoreResult<Option<NamedRef>>
where
    R: ReferenceData + ?Sized,
{
    match id {
        Some(id) => refs.lookup_named(kind, id).await,
        None => Ok(None),
    }
}

/// Replaces the classification's foreign ids with their display records.
pub async fn resolve<R>(refs: &R, info: &Classification) -> StoreResult<ResolvedInfo>
where
    R: ReferenceData + ?Sized,
{
    let age_group = match info.age_group_id {
        Some(id) => refs.lookup_age_group(id).await?,
        None => None,
    };

    Ok(ResolvedInfo {
        exam_type: info.exam_type.clone(),
        difficulty_level: info.difficulty_level.clone(),
        board: named(refs, ReferenceKind::Board, info.board_id).await?,
        standard: named(refs, ReferenceKind::Standard, info.standard_id).await?,
        subject: named(refs, ReferenceKind::Subject, info.subject_id).await?,
        topic: named(refs, ReferenceKind::Topic, info.topic_id).await?,
        age_group,
    })
}
