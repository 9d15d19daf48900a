use crate::{
    config::DeleteConfig,
    delete::{DeleteError, DeletePlan, DeleteReport, DeleteRequest, DeleteSession},
    model::{EntityKind, EntityRecord, EntityRef, Ownership},
    security::{GroupPermissions, GroupPolicyOracle, Principal},
    spec::DeleteSpecRegistry,
    store::MemoryStore,
};

pub(crate) const OWNER: i64 = 1;
pub(crate) const OTHER: i64 = 2;
pub(crate) const GROUP: i64 = 10;

///
/// Graph
///
/// Memory store seeded row by row, plus the standard registry.
///

pub(crate) struct Graph {
    pub(crate) store: MemoryStore,
    pub(crate) registry: DeleteSpecRegistry,
    next_id: i64,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            registry: DeleteSpecRegistry::standard().expect("standard registry"),
            next_id: 0,
        }
    }

    pub(crate) fn row(&mut self, kind: EntityKind, refs: &[(&'static str, EntityRef)]) -> EntityRef {
        self.row_as(kind, Ownership::new(OWNER, GROUP), None, refs)
    }

    pub(crate) fn row_as(
        &mut self,
        kind: EntityKind,
        details: Ownership,
        namespace: Option<&str>,
        refs: &[(&'static str, EntityRef)],
    ) -> EntityRef {
        self.next_id += 1;
        let entity = EntityRef::new(kind, self.next_id);

        let mut record = EntityRecord::new(entity, details);
        if let Some(namespace) = namespace {
            record = record.with_namespace(namespace);
        }
        for (field, target) in refs {
            record = record.with_ref(field, *target);
        }
        self.store.insert(record).expect("fixture insert");

        entity
    }

    pub(crate) fn dataset(&mut self) -> EntityRef {
        self.row(EntityKind::Dataset, &[])
    }

    /// An image with one pixels row; returns `(image, pixels)`.
    pub(crate) fn image(&mut self) -> (EntityRef, EntityRef) {
        let image = self.row(EntityKind::Image, &[]);
        let pixels = self.row(EntityKind::Pixels, &[("image", image)]);

        (image, pixels)
    }

    pub(crate) fn contain(&mut self, dataset: EntityRef, image: EntityRef) -> EntityRef {
        self.row(
            EntityKind::DatasetImageLink,
            &[("parent", dataset), ("child", image)],
        )
    }

    /// Annotation owned by `details`, linked to `target`; returns `(link, annotation)`.
    pub(crate) fn annotate(
        &mut self,
        target: EntityRef,
        kind: EntityKind,
        details: Ownership,
        namespace: Option<&str>,
    ) -> (EntityRef, EntityRef) {
        let annotation = self.row_as(kind, details, namespace, &[]);
        let link = self.row(
            EntityKind::AnnotationLink,
            &[("parent", target), ("child", annotation)],
        );

        (link, annotation)
    }

    pub(crate) fn plan(&mut self, request: &DeleteRequest) -> Result<DeletePlan, DeleteError> {
        let oracle = GroupPolicyOracle::new().with_group(GROUP, GroupPermissions::ReadWrite);
        let principal = Principal::new(OWNER).member(GROUP);

        DeleteSession::new(&self.registry, &mut self.store, &oracle, &principal).plan(request)
    }

    pub(crate) fn delete(&mut self, request: &DeleteRequest) -> Result<DeleteReport, DeleteError> {
        self.delete_as(
            &Principal::new(OWNER).member(GROUP),
            GroupPermissions::ReadWrite,
            DeleteConfig::new(),
            request,
        )
    }

    pub(crate) fn delete_as(
        &mut self,
        principal: &Principal,
        permissions: GroupPermissions,
        config: DeleteConfig,
        request: &DeleteRequest,
    ) -> Result<DeleteReport, DeleteError> {
        let oracle = GroupPolicyOracle::new().with_group(GROUP, permissions);

        DeleteSession::new(&self.registry, &mut self.store, &oracle, principal)
            .config(config)
            .delete(request)
    }
}
