//! Delete graph for the standard scientific data model.

use crate::{
    model::EntityKind as K,
    spec::{
        DeleteSpecRegistry, Holder, NS_COMPANION_FILE, NullableRef, Relation, RegistryBuilder,
        RegistryError,
    },
};

const fn child_held(parent: K, name: &'static str, child: K, field: &'static str) -> Relation {
    Relation::new(parent, name, child, field, Holder::Child)
}

const fn parent_held(parent: K, name: &'static str, child: K, field: &'static str) -> Relation {
    Relation::new(parent, name, child, field, Holder::Parent)
}

// Containment through link rows: parent -> link (link) and link -> child (cascade).
fn containment(
    builder: RegistryBuilder,
    parent: K,
    name: &'static str,
    link: K,
    child: K,
) -> RegistryBuilder {
    builder
        .link(child_held(parent, name, link, "parent"))
        .cascade(parent_held(link, "child", child, "child"))
}

impl DeleteSpecRegistry {
    /// Registry for the standard Project/Screen/Image/Annotation model.
    pub fn standard() -> Result<Self, RegistryError> {
        standard_builder().build()
    }
}

/// Builder pre-loaded with the standard model, open for extension.
#[must_use]
pub fn standard_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new()
        .unshareable_kind(K::ExternalInfo)
        .unshareable_namespace(NS_COMPANION_FILE);

    // containers
    builder = containment(
        builder,
        K::Project,
        "datasetLinks",
        K::ProjectDatasetLink,
        K::Dataset,
    );
    builder = containment(builder, K::Dataset, "imageLinks", K::DatasetImageLink, K::Image);
    builder = containment(builder, K::Screen, "plateLinks", K::ScreenPlateLink, K::Plate);

    // image graph
    builder = builder
        .cascade(child_held(K::Image, "pixels", K::Pixels, "image"))
        .cascade(child_held(K::Pixels, "channels", K::Channel, "pixels"))
        .cascade(child_held(K::Pixels, "settings", K::RenderingDef, "pixels"))
        .cascade(child_held(K::Image, "rois", K::Roi, "image"))
        .cascade(child_held(K::Roi, "shapes", K::Shape, "roi"))
        .nullable(NullableRef::new(K::Pixels, "relatedTo", K::Pixels));

    // plate graph
    builder = builder
        .cascade(child_held(K::Plate, "wells", K::Well, "plate"))
        .cascade(child_held(K::Plate, "plateAcquisitions", K::PlateAcquisition, "plate"))
        .cascade(child_held(K::Well, "wellSamples", K::WellSample, "well"))
        .cascade(child_held(
            K::PlateAcquisition,
            "wellSamples",
            K::WellSample,
            "plateAcquisition",
        ))
        .cascade(parent_held(K::WellSample, "image", K::Image, "image"));

    // filesets and files
    builder = builder
        .cascade(child_held(K::Fileset, "images", K::Image, "fileset"))
        .orphan(parent_held(K::Image, "fileset", K::Fileset, "fileset"))
        .cascade(child_held(K::Fileset, "usedFiles", K::FilesetEntry, "fileset"))
        .cascade(parent_held(
            K::FilesetEntry,
            "originalFile",
            K::OriginalFile,
            "originalFile",
        ))
        .cascade(parent_held(K::FileAnnotation, "file", K::OriginalFile, "file"));

    // annotations
    for kind in K::ALL {
        if kind.capabilities().annotatable {
            builder =
                builder.link(child_held(kind, "annotationLinks", K::AnnotationLink, "parent"));
        }
    }
    for annotation in K::ANNOTATIONS {
        builder = builder.cascade(Relation::new(
            K::AnnotationLink,
            annotation_child_name(annotation),
            annotation,
            "child",
            Holder::Parent,
        ));
    }

    // external info
    for kind in K::ALL {
        if kind.capabilities().ownable {
            builder = builder.cascade(parent_held(
                kind,
                "externalInfo",
                K::ExternalInfo,
                "externalInfo",
            ));
        }
    }

    builder
}

// Edge names must be unique per parent; the link row fans out per annotation kind.
const fn annotation_child_name(kind: K) -> &'static str {
    match kind {
        K::BooleanAnnotation => "child:BooleanAnnotation",
        K::CommentAnnotation => "child:CommentAnnotation",
        K::DoubleAnnotation => "child:DoubleAnnotation",
        K::FileAnnotation => "child:FileAnnotation",
        K::LongAnnotation => "child:LongAnnotation",
        K::MapAnnotation => "child:MapAnnotation",
        K::TagAnnotation => "child:TagAnnotation",
        K::TermAnnotation => "child:TermAnnotation",
        K::TimestampAnnotation => "child:TimestampAnnotation",
        _ => "child:XmlAnnotation",
    }
}
