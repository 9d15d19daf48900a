//! Shared fixture builder for integration tests.
#![allow(dead_code)]

use reapdb_core::{
    config::DeleteConfig,
    delete::{DeleteError, DeletePlan, DeleteReport, DeleteRequest, DeleteSession},
    model::{EntityKind, EntityRecord, EntityRef, Ownership},
    security::{GroupPermissions, GroupPolicyOracle, Principal},
    spec::DeleteSpecRegistry,
    store::{EntityStore, MemoryStore},
};

pub const OWNER: i64 = 1;
pub const OTHER: i64 = 2;
pub const GROUP: i64 = 10;

///
/// Fixture
///
/// Rows are owned by `OWNER` in `GROUP` unless built with `owned_by`.
///

pub struct Fixture {
    pub store: MemoryStore,
    pub registry: DeleteSpecRegistry,
    pub oracle: GroupPolicyOracle,
    details: Ownership,
    next_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_permissions(GroupPermissions::ReadWrite)
    }

    pub fn with_permissions(permissions: GroupPermissions) -> Self {
        Self {
            store: MemoryStore::new(),
            registry: DeleteSpecRegistry::standard().expect("standard registry"),
            oracle: GroupPolicyOracle::new().with_group(GROUP, permissions),
            details: Ownership::new(OWNER, GROUP),
            next_id: 0,
        }
    }

    /// Build subsequent rows with different owner/group details.
    pub fn owned_by(&mut self, details: Ownership) -> &mut Self {
        self.details = details;
        self
    }

    pub fn add(&mut self, kind: EntityKind, refs: &[(&'static str, EntityRef)]) -> EntityRef {
        self.add_record(kind, None, refs)
    }

    pub fn add_record(
        &mut self,
        kind: EntityKind,
        namespace: Option<&str>,
        refs: &[(&'static str, EntityRef)],
    ) -> EntityRef {
        self.next_id += 1;
        let entity = EntityRef::new(kind, self.next_id);

        let mut record = EntityRecord::new(entity, self.details);
        if let Some(namespace) = namespace {
            record = record.with_namespace(namespace);
        }
        for (field, target) in refs {
            record = record.with_ref(field, *target);
        }
        self.store.insert(record).expect("fixture insert");

        entity
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    pub fn dataset(&mut self) -> EntityRef {
        self.add(EntityKind::Dataset, &[])
    }

    pub fn contain(&mut self, dataset: EntityRef, image: EntityRef) -> EntityRef {
        self.add(
            EntityKind::DatasetImageLink,
            &[("parent", dataset), ("child", image)],
        )
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Image with a pixels row, two channels and a rendering setting.
    pub fn image(&mut self) -> ImageRows {
        let image = self.add(EntityKind::Image, &[]);
        self.image_rows(image)
    }

    pub fn image_in_fileset(&mut self, fileset: EntityRef) -> ImageRows {
        let image = self.add(EntityKind::Image, &[("fileset", fileset)]);
        self.image_rows(image)
    }

    fn image_rows(&mut self, image: EntityRef) -> ImageRows {
        let pixels = self.add(EntityKind::Pixels, &[("image", image)]);
        let channels = [
            self.add(EntityKind::Channel, &[("pixels", pixels)]),
            self.add(EntityKind::Channel, &[("pixels", pixels)]),
        ];
        let settings = self.add(EntityKind::RenderingDef, &[("pixels", pixels)]);

        ImageRows {
            image,
            pixels,
            channels,
            settings,
        }
    }

    /// Annotation of `kind` linked to `target`; returns `(link, annotation)`.
    pub fn annotate(
        &mut self,
        target: EntityRef,
        kind: EntityKind,
        namespace: Option<&str>,
    ) -> (EntityRef, EntityRef) {
        let annotation = self.add_record(kind, namespace, &[]);
        let link = self.add(
            EntityKind::AnnotationLink,
            &[("parent", target), ("child", annotation)],
        );

        (link, annotation)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn owner() -> Principal {
        Principal::new(OWNER).member(GROUP)
    }

    pub fn plan(&mut self, request: &DeleteRequest) -> Result<DeletePlan, DeleteError> {
        let principal = Self::owner();

        DeleteSession::new(&self.registry, &mut self.store, &self.oracle, &principal).plan(request)
    }

    pub fn delete(&mut self, request: &DeleteRequest) -> Result<DeleteReport, DeleteError> {
        self.delete_with(&Self::owner(), DeleteConfig::new(), request)
    }

    pub fn delete_with(
        &mut self,
        principal: &Principal,
        config: DeleteConfig,
        request: &DeleteRequest,
    ) -> Result<DeleteReport, DeleteError> {
        DeleteSession::new(&self.registry, &mut self.store, &self.oracle, principal)
            .config(config)
            .delete(request)
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    pub fn exists(&self, entity: EntityRef) -> bool {
        self.store.get(entity).expect("store read").is_some()
    }

    #[track_caller]
    pub fn assert_gone(&self, entities: &[EntityRef]) {
        for entity in entities {
            assert!(!self.exists(*entity), "{entity} should have been deleted");
        }
    }

    #[track_caller]
    pub fn assert_present(&self, entities: &[EntityRef]) {
        for entity in entities {
            assert!(self.exists(*entity), "{entity} should remain");
        }
    }
}

///
/// ImageRows
///

#[derive(Clone, Copy, Debug)]
pub struct ImageRows {
    pub image: EntityRef,
    pub pixels: EntityRef,
    pub channels: [EntityRef; 2],
    pub settings: EntityRef,
}

impl ImageRows {
    pub fn all(&self) -> Vec<EntityRef> {
        vec![
            self.image,
            self.pixels,
            self.channels[0],
            self.channels[1],
            self.settings,
        ]
    }
}

pub fn request(kind: EntityKind, entities: &[EntityRef]) -> DeleteRequest {
    DeleteRequest::new(kind, entities.iter().map(|entity| entity.id))
}
