use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};

///
/// EntityKind
///
/// Closed set of persisted entity kinds known to the delete engine.
/// Behaviour that would otherwise hang off a class hierarchy is expressed
/// through [`KindCapabilities`].
///

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[remain::sorted]
pub enum EntityKind {
    AnnotationLink,
    BooleanAnnotation,
    Channel,
    CommentAnnotation,
    Dataset,
    DatasetImageLink,
    DoubleAnnotation,
    ExternalInfo,
    FileAnnotation,
    Fileset,
    FilesetEntry,
    Image,
    LongAnnotation,
    MapAnnotation,
    OriginalFile,
    Pixels,
    Plate,
    PlateAcquisition,
    Project,
    ProjectDatasetLink,
    RenderingDef,
    Roi,
    Screen,
    ScreenPlateLink,
    Shape,
    TagAnnotation,
    TermAnnotation,
    TimestampAnnotation,
    Well,
    WellSample,
    XmlAnnotation,
}

impl EntityKind {
    /// Every kind, in declaration (alphabetical) order.
    pub const ALL: [Self; 31] = [
        Self::AnnotationLink,
        Self::BooleanAnnotation,
        Self::Channel,
        Self::CommentAnnotation,
        Self::Dataset,
        Self::DatasetImageLink,
        Self::DoubleAnnotation,
        Self::ExternalInfo,
        Self::FileAnnotation,
        Self::Fileset,
        Self::FilesetEntry,
        Self::Image,
        Self::LongAnnotation,
        Self::MapAnnotation,
        Self::OriginalFile,
        Self::Pixels,
        Self::Plate,
        Self::PlateAcquisition,
        Self::Project,
        Self::ProjectDatasetLink,
        Self::RenderingDef,
        Self::Roi,
        Self::Screen,
        Self::ScreenPlateLink,
        Self::Shape,
        Self::TagAnnotation,
        Self::TermAnnotation,
        Self::TimestampAnnotation,
        Self::Well,
        Self::WellSample,
        Self::XmlAnnotation,
    ];

    /// Annotation subkinds.
    pub const ANNOTATIONS: [Self; 10] = [
        Self::BooleanAnnotation,
        Self::CommentAnnotation,
        Self::DoubleAnnotation,
        Self::FileAnnotation,
        Self::LongAnnotation,
        Self::MapAnnotation,
        Self::TagAnnotation,
        Self::TermAnnotation,
        Self::TimestampAnnotation,
        Self::XmlAnnotation,
    ];

    #[must_use]
    pub const fn capabilities(self) -> KindCapabilities {
        if self.is_annotation() {
            return KindCapabilities {
                ownable: true,
                annotatable: true,
                link: false,
                annotation: true,
            };
        }

        match self {
            Self::AnnotationLink
            | Self::DatasetImageLink
            | Self::ProjectDatasetLink
            | Self::ScreenPlateLink => KindCapabilities {
                ownable: true,
                annotatable: false,
                link: true,
                annotation: false,
            },
            Self::Channel
            | Self::Dataset
            | Self::Fileset
            | Self::Image
            | Self::Plate
            | Self::PlateAcquisition
            | Self::Project
            | Self::Roi
            | Self::Screen
            | Self::Well => KindCapabilities {
                ownable: true,
                annotatable: true,
                link: false,
                annotation: false,
            },
            Self::ExternalInfo => KindCapabilities {
                ownable: false,
                annotatable: false,
                link: false,
                annotation: false,
            },
            _ => KindCapabilities {
                ownable: true,
                annotatable: false,
                link: false,
                annotation: false,
            },
        }
    }

    #[must_use]
    pub const fn is_annotation(self) -> bool {
        matches!(
            self,
            Self::BooleanAnnotation
                | Self::CommentAnnotation
                | Self::DoubleAnnotation
                | Self::FileAnnotation
                | Self::LongAnnotation
                | Self::MapAnnotation
                | Self::TagAnnotation
                | Self::TermAnnotation
                | Self::TimestampAnnotation
                | Self::XmlAnnotation
        )
    }

    #[must_use]
    pub const fn is_link(self) -> bool {
        self.capabilities().link
    }
}

///
/// KindCapabilities
///
/// Per-kind capability flags consulted by the registry builder and the
/// delete pipeline.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KindCapabilities {
    /// Rows carry owner/group details and are subject to authorization.
    pub ownable: bool,
    /// Rows may be the parent side of an `AnnotationLink`.
    pub annotatable: bool,
    /// Rows are pure many-to-many link rows.
    pub link: bool,
    /// Rows are annotations and may carry a namespace.
    pub annotation: bool,
}
