mod support;

use reapdb_core::{
    delete::{ChildOption, DeleteState, NodeOutcome, RootStatus},
    model::{EntityKind, LinkRef},
    spec::NS_COMPANION_FILE,
    store::EntityStore,
};
use support::{Fixture, request};

#[test]
fn shared_image_survives_dataset_delete() {
    let mut fx = Fixture::new();
    let ds1 = fx.dataset();
    let ds2 = fx.dataset();
    let i1 = fx.image();
    let i2 = fx.image();
    let l1 = fx.contain(ds1, i1.image);
    let l2 = fx.contain(ds1, i2.image);
    let l3 = fx.contain(ds2, i2.image);

    let report = fx
        .delete(&request(EntityKind::Dataset, &[ds1]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    assert_eq!(report.root_status(ds1), Some(RootStatus::Completed));
    assert_eq!(report.outcome(i2.image), Some(NodeOutcome::Unlinked));
    assert_eq!(report.deleted_of(EntityKind::Image), vec![i1.image]);

    fx.assert_gone(&[ds1, l1, l2]);
    fx.assert_gone(&i1.all());
    fx.assert_present(&[ds2, l3]);
    fx.assert_present(&i2.all());
}

#[test]
fn image_goes_when_every_holding_dataset_goes() {
    let mut fx = Fixture::new();
    let ds1 = fx.dataset();
    let ds2 = fx.dataset();
    let shared = fx.image();
    fx.contain(ds1, shared.image);
    fx.contain(ds2, shared.image);

    let report = fx
        .delete(&request(EntityKind::Dataset, &[ds1, ds2]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    assert!(report.is_deleted(shared.image));
    fx.assert_gone(&shared.all());
    assert!(fx.store.is_empty());
}

#[test]
fn project_delete_cascades_through_links() {
    let mut fx = Fixture::new();
    let project = fx.add(EntityKind::Project, &[]);
    let dataset = fx.dataset();
    let pdl = fx.add(
        EntityKind::ProjectDatasetLink,
        &[("parent", project), ("child", dataset)],
    );
    let image = fx.image();
    fx.contain(dataset, image.image);

    let report = fx
        .delete(&request(EntityKind::Project, &[project]))
        .expect("delete");

    assert_eq!(report.root_status(project), Some(RootStatus::Completed));
    fx.assert_gone(&[project, pdl, dataset]);
    fx.assert_gone(&image.all());
    assert!(fx.store.is_empty());
}

#[test]
fn annotation_shared_by_another_image_is_kept() {
    let mut fx = Fixture::new();
    let i1 = fx.image();
    let i2 = fx.image();
    let (link1, tag) = fx.annotate(i1.image, EntityKind::TagAnnotation, None);
    let link2 = fx.add(
        EntityKind::AnnotationLink,
        &[("parent", i2.image), ("child", tag)],
    );

    let report = fx
        .delete(&request(EntityKind::Image, &[i1.image]))
        .expect("delete");

    assert!(!report.is_deleted(tag));
    fx.assert_gone(&[link1]);
    fx.assert_present(&[tag, link2]);
}

#[test]
fn companion_namespace_overrides_child_option() {
    let mut fx = Fixture::new();
    let image = fx.image();

    let companion_file = fx.add(EntityKind::OriginalFile, &[]);
    let companion = fx.add_record(
        EntityKind::FileAnnotation,
        Some(NS_COMPANION_FILE),
        &[("file", companion_file)],
    );
    let companion_link = fx.add(
        EntityKind::AnnotationLink,
        &[("parent", image.image), ("child", companion)],
    );
    let (keep_link, keep) = fx.annotate(image.image, EntityKind::FileAnnotation, Some("keepme"));

    let option = ChildOption::new().exclude_type(EntityKind::FileAnnotation);
    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]).option(option))
        .expect("delete");

    assert_eq!(report.outcome(keep), Some(NodeOutcome::KeptByOption));
    assert!(report.is_deleted(companion));

    fx.assert_gone(&[companion, companion_file, companion_link, keep_link]);
    fx.assert_present(&[keep]);
    fx.assert_gone(&image.all());
}

#[test]
fn namespace_option_keeps_only_that_namespace() {
    let mut fx = Fixture::new();
    let image = fx.image();
    let (_, kept) = fx.annotate(image.image, EntityKind::MapAnnotation, Some("keepme"));
    let (_, dropped) = fx.annotate(image.image, EntityKind::MapAnnotation, Some("other"));

    let option = ChildOption::new().exclude_namespace("keepme");
    fx.delete(&request(EntityKind::Image, &[image.image]).option(option))
        .expect("delete");

    fx.assert_present(&[kept]);
    fx.assert_gone(&[dropped]);
}

#[test]
fn requery_after_delete_finds_nothing() {
    let mut fx = Fixture::new();
    let dataset = fx.dataset();
    let image = fx.image();
    fx.contain(dataset, image.image);
    let req = request(EntityKind::Dataset, &[dataset]);

    fx.delete(&req).expect("first delete");
    let remaining = fx.store.len();

    let plan = fx.plan(&req).expect("plan");
    assert!(plan.is_empty());
    assert_eq!(plan.missing(), &[dataset]);

    let report = fx.delete(&req).expect("second delete");
    assert_eq!(report.state, DeleteState::Completed);
    assert_eq!(report.root_status(dataset), Some(RootStatus::NotFound));
    assert!(report.deleted_refs.is_empty());
    assert_eq!(fx.store.len(), remaining);
}

#[test]
fn run_delete_leaves_other_runs_of_the_plate() {
    let mut fx = Fixture::new();
    let plate = fx.add(EntityKind::Plate, &[]);
    let well = fx.add(EntityKind::Well, &[("plate", plate)]);
    let run1 = fx.add(EntityKind::PlateAcquisition, &[("plate", plate)]);
    let run2 = fx.add(EntityKind::PlateAcquisition, &[("plate", plate)]);
    let i1 = fx.image();
    let i2 = fx.image();
    let ws1 = fx.add(
        EntityKind::WellSample,
        &[("well", well), ("plateAcquisition", run1), ("image", i1.image)],
    );
    let ws2 = fx.add(
        EntityKind::WellSample,
        &[("well", well), ("plateAcquisition", run2), ("image", i2.image)],
    );

    let report = fx
        .delete(&request(EntityKind::PlateAcquisition, &[run1]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    fx.assert_gone(&[run1, ws1]);
    fx.assert_gone(&i1.all());
    fx.assert_present(&[plate, well, run2, ws2]);
    fx.assert_present(&i2.all());
}

#[test]
fn plate_delete_takes_every_run_and_sample() {
    let mut fx = Fixture::new();
    let plate = fx.add(EntityKind::Plate, &[]);
    let well = fx.add(EntityKind::Well, &[("plate", plate)]);
    let run = fx.add(EntityKind::PlateAcquisition, &[("plate", plate)]);
    let image = fx.image();
    let sample = fx.add(
        EntityKind::WellSample,
        &[("well", well), ("plateAcquisition", run), ("image", image.image)],
    );

    fx.delete(&request(EntityKind::Plate, &[plate]))
        .expect("delete");

    fx.assert_gone(&[plate, well, run, sample]);
    fx.assert_gone(&image.all());
}

#[test]
fn related_pixels_reference_is_nulled() {
    let mut fx = Fixture::new();
    let deleted = fx.image();
    let kept = fx.image();
    fx.store
        .link(LinkRef::new(kept.pixels, "relatedTo", deleted.pixels))
        .expect("link");

    let report = fx
        .delete(&request(EntityKind::Image, &[deleted.image]))
        .expect("delete");

    assert_eq!(
        report.nulled,
        vec![LinkRef::new(kept.pixels, "relatedTo", deleted.pixels)]
    );
    fx.assert_gone(&deleted.all());
    fx.assert_present(&kept.all());

    let record = fx
        .store
        .get(kept.pixels)
        .expect("read")
        .expect("kept pixels");
    assert_eq!(record.targets("relatedTo").count(), 0);
}

#[test]
fn skip_head_deletes_only_channels() {
    let mut fx = Fixture::new();
    let image = fx.image();

    let req = request(EntityKind::Image, &[image.image])
        .skip_head()
        .start_from(EntityKind::Channel);
    let report = fx.delete(&req).expect("delete");

    assert_eq!(report.root_status(image.image), Some(RootStatus::Completed));
    assert_eq!(report.outcome(image.image), Some(NodeOutcome::KeptByOption));
    assert_eq!(report.deleted_refs.len(), 2);

    fx.assert_gone(&image.channels);
    fx.assert_present(&[image.image, image.pixels, image.settings]);
}

#[test]
fn skip_head_deletes_only_rendering_settings() {
    let mut fx = Fixture::new();
    let image = fx.image();

    let req = request(EntityKind::Image, &[image.image])
        .skip_head()
        .start_from(EntityKind::RenderingDef);
    fx.delete(&req).expect("delete");

    fx.assert_gone(&[image.settings]);
    fx.assert_present(&[image.image, image.pixels]);
    fx.assert_present(&image.channels);
}

#[test]
fn skip_head_without_start_kind_empties_a_dataset() {
    let mut fx = Fixture::new();
    let dataset = fx.dataset();
    let image = fx.image();
    let link = fx.contain(dataset, image.image);

    fx.delete(&request(EntityKind::Dataset, &[dataset]).skip_head())
        .expect("delete");

    fx.assert_present(&[dataset]);
    fx.assert_gone(&[link]);
    fx.assert_gone(&image.all());
}

#[test]
fn fileset_is_collected_with_its_last_image() {
    let mut fx = Fixture::new();
    let fileset = fx.add(EntityKind::Fileset, &[]);
    let file = fx.add(EntityKind::OriginalFile, &[]);
    let entry = fx.add(
        EntityKind::FilesetEntry,
        &[("fileset", fileset), ("originalFile", file)],
    );
    let a = fx.image_in_fileset(fileset);
    let b = fx.image_in_fileset(fileset);

    let first = fx
        .delete(&request(EntityKind::Image, &[a.image]))
        .expect("first delete");
    assert!(!first.is_deleted(fileset));
    fx.assert_gone(&a.all());
    fx.assert_present(&[fileset, entry, file, b.image]);

    let second = fx
        .delete(&request(EntityKind::Image, &[b.image]))
        .expect("second delete");
    assert!(second.is_deleted(fileset));
    fx.assert_gone(&[fileset, entry, file]);
    fx.assert_gone(&b.all());
}

#[test]
fn annotation_chain_stops_after_one_hop() {
    let mut fx = Fixture::new();
    let image = fx.image();
    let (l1, t1) = fx.annotate(image.image, EntityKind::TagAnnotation, None);
    let (l2, t2) = fx.annotate(t1, EntityKind::TagAnnotation, None);
    let (l3, t3) = fx.annotate(t2, EntityKind::TagAnnotation, None);

    let report = fx
        .delete(&request(EntityKind::Image, &[image.image]))
        .expect("delete");

    assert_eq!(report.state, DeleteState::Completed);
    assert!(report.is_deleted(t1));
    assert!(report.is_deleted(l2));
    assert_eq!(report.outcome(t2), None);

    fx.assert_gone(&image.all());
    fx.assert_gone(&[l1, t1, l2]);
    fx.assert_present(&[t2, l3, t3]);
}

#[test]
fn runs_deleted_one_at_a_time_then_the_plate() {
    let mut fx = Fixture::new();
    let plate = fx.add(EntityKind::Plate, &[]);
    let wells = [
        fx.add(EntityKind::Well, &[("plate", plate)]),
        fx.add(EntityKind::Well, &[("plate", plate)]),
    ];
    let runs: Vec<_> = (0..3)
        .map(|_| fx.add(EntityKind::PlateAcquisition, &[("plate", plate)]))
        .collect();

    // one sample per (run, well)
    let mut per_run = Vec::new();
    for run in &runs {
        let mut rows = Vec::new();
        for well in &wells {
            let image = fx.image();
            let sample = fx.add(
                EntityKind::WellSample,
                &[("well", *well), ("plateAcquisition", *run), ("image", image.image)],
            );
            rows.push(sample);
            rows.extend(image.all());
        }
        per_run.push(rows);
    }

    let loose_image = fx.image();
    let loose = fx.add(
        EntityKind::WellSample,
        &[("well", wells[0]), ("image", loose_image.image)],
    );

    for (index, run) in runs.iter().enumerate() {
        let report = fx
            .delete(&request(EntityKind::PlateAcquisition, &[*run]))
            .expect("run delete");
        assert_eq!(report.state, DeleteState::Completed);

        fx.assert_gone(&[*run]);
        fx.assert_gone(&per_run[index]);
        for later in &per_run[index + 1..] {
            fx.assert_present(later);
        }
        fx.assert_present(&[plate, wells[0], wells[1], loose]);
        fx.assert_present(&loose_image.all());
    }

    let report = fx
        .delete(&request(EntityKind::Plate, &[plate]))
        .expect("plate delete");
    assert_eq!(report.state, DeleteState::Completed);
    assert!(report.is_deleted(loose));
    assert!(fx.store.is_empty());
}
