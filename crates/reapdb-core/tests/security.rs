mod support;

use reapdb_core::{
    config::DeleteConfig,
    delete::{DeleteError, DeleteState, NodeOutcome, RootStatus},
    error::ErrorClass,
    model::{EntityKind, Ownership},
    security::{AccessAction, Authorization, GroupPermissions, Principal},
};
use support::{Fixture, GROUP, OTHER, OWNER, request};

fn member(user_id: i64) -> Principal {
    Principal::new(user_id).member(GROUP)
}

#[test]
fn root_denial_leaves_the_store_untouched() {
    let mut fx = Fixture::with_permissions(GroupPermissions::Private);
    let dataset = fx.dataset();
    let image = fx.image();
    fx.contain(dataset, image.image);
    let before = fx.store.len();

    let err = fx
        .delete_with(
            &member(OTHER),
            DeleteConfig::new(),
            &request(EntityKind::Dataset, &[dataset]),
        )
        .expect_err("root is not deletable by another user");

    assert!(matches!(
        err,
        DeleteError::SecurityViolation { entity, user_id: OTHER } if entity == dataset
    ));
    assert_eq!(err.class(), ErrorClass::Unauthorized);
    assert!(err.is_security_violation());
    assert_eq!(err.terminal_state(), Some(DeleteState::Denied));
    assert_eq!(fx.store.len(), before);
    assert!(!fx.store.in_transaction());
}

#[test]
fn read_only_group_denial_is_distinct() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadOnly);
    let image = fx.image();

    // leaders act in read-write groups but not read-only ones
    for principal in [member(OTHER), Principal::new(OTHER).leader(GROUP)] {
        let err = fx
            .delete_with(
                &principal,
                DeleteConfig::new(),
                &request(EntityKind::Image, &[image.image]),
            )
            .expect_err("read-only group");

        assert!(matches!(
            err,
            DeleteError::ReadOnlyGroupSecurityViolation { group_id: GROUP, .. }
        ));
        assert!(err.is_security_violation());
    }
    fx.assert_present(&image.all());
}

#[test]
fn leader_and_admin_may_delete_rows_they_do_not_own() {
    let mut fx = Fixture::new();
    let a = fx.image();
    let b = fx.image();

    fx.delete_with(
        &Principal::new(OTHER).leader(GROUP),
        DeleteConfig::new(),
        &request(EntityKind::Image, &[a.image]),
    )
    .expect("leader delete");
    fx.delete_with(
        &Principal::new(99).admin(),
        DeleteConfig::new(),
        &request(EntityKind::Image, &[b.image]),
    )
    .expect("admin delete");

    fx.assert_gone(&a.all());
    fx.assert_gone(&b.all());
}

#[test]
fn denied_dependent_is_kept_and_reported() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadAnnotate);
    let image = fx.image();
    fx.owned_by(Ownership::new(OTHER, GROUP));
    let tag = fx.add(EntityKind::TagAnnotation, &[]);
    fx.owned_by(Ownership::new(OWNER, GROUP));
    let link = fx.add(
        EntityKind::AnnotationLink,
        &[("parent", image.image), ("child", tag)],
    );

    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    assert_eq!(report.root_status(image.image), Some(RootStatus::Completed));
    assert_eq!(report.outcome(tag), Some(NodeOutcome::DeniedWarning));

    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.entity, tag);
    assert_eq!(warning.action, AccessAction::Delete);
    assert_eq!(warning.authorization, Authorization::Denied);

    fx.assert_gone(&image.all());
    fx.assert_gone(&[link]);
    fx.assert_present(&[tag]);
}

#[test]
fn all_or_nothing_turns_dependent_denial_into_an_error() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadAnnotate);
    let image = fx.image();
    fx.owned_by(Ownership::new(OTHER, GROUP));
    let tag = fx.add(EntityKind::TagAnnotation, &[]);
    fx.owned_by(Ownership::new(OWNER, GROUP));
    fx.add(
        EntityKind::AnnotationLink,
        &[("parent", image.image), ("child", tag)],
    );
    let before = fx.store.len();

    let err = fx
        .delete_with(
            &Fixture::owner(),
            DeleteConfig::all_or_nothing(),
            &request(EntityKind::Image, &[image.image]),
        )
        .expect_err("dependent denied");

    assert!(matches!(err, DeleteError::SecurityViolation { entity, .. } if entity == tag));
    assert_eq!(fx.store.len(), before);
}

#[test]
fn foreign_link_into_deleted_image_only_needs_unlink() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadAnnotate);
    let image = fx.image();
    fx.owned_by(Ownership::new(OTHER, GROUP));
    let dataset = fx.dataset();
    let link = fx.contain(dataset, image.image);

    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]))
        .expect("delete");

    assert!(report.warnings.is_empty());
    assert!(report.is_deleted(link));
    fx.assert_gone(&image.all());
    fx.assert_gone(&[link]);
    fx.assert_present(&[dataset]);
}

#[test]
fn foreign_annotation_link_is_unlinked_and_its_tag_kept() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadAnnotate);
    let image = fx.image();
    fx.owned_by(Ownership::new(OTHER, GROUP));
    let (link, tag) = fx.annotate(image.image, EntityKind::TagAnnotation, None);

    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    assert_eq!(report.root_status(image.image), Some(RootStatus::Completed));
    assert!(report.errors.is_empty());
    assert_eq!(report.outcome(link), Some(NodeOutcome::Deleted));
    assert_eq!(report.outcome(tag), Some(NodeOutcome::DeniedWarning));

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].entity, tag);

    fx.assert_gone(&image.all());
    fx.assert_gone(&[link]);
    fx.assert_present(&[tag]);
}

#[test]
fn every_warned_entity_has_an_outcome() {
    let mut fx = Fixture::with_permissions(GroupPermissions::ReadAnnotate);
    let image = fx.image();
    fx.owned_by(Ownership::new(OTHER, GROUP));
    let file = fx.add(EntityKind::OriginalFile, &[]);
    let annotation = fx.add(EntityKind::FileAnnotation, &[("file", file)]);
    fx.owned_by(Ownership::new(OWNER, GROUP));
    let link = fx.add(
        EntityKind::AnnotationLink,
        &[("parent", image.image), ("child", annotation)],
    );

    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    let warned: Vec<_> = report.warnings.iter().map(|w| w.entity).collect();
    assert!(warned.contains(&annotation));
    assert!(warned.contains(&file));
    for entity in warned {
        assert_eq!(
            report.outcome(entity),
            Some(NodeOutcome::DeniedWarning),
            "{entity}"
        );
        assert!(report.kept_refs.contains(&entity));
    }

    fx.assert_gone(&image.all());
    fx.assert_gone(&[link]);
    fx.assert_present(&[annotation, file]);
}
