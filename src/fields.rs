use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// Article attributes that requirement rules and destination schemas can refer to.
///
/// Identifiers serialize in camelCase (`shelfLife`, `packageSizeMaterial`, ...)
/// so rule lists read the same in configuration files and in issue labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldId {
    Ean,
    Title,
    Description,
    SupplierCategory,
    Brand,
    ShelfLife,
    ProductSpecs,
    PackageSpecs,
    RtsPackageSpecs,
    ProductSizeMaterial,
    PackageSizeMaterial,
    SupplyDate,
    SupplyVolume,
    CountryOfOrigin,
    SalesForecast,
    ProposedPrice,
    RetailCenters,
    Photos,
    Certificates,
    MultiAnglePhotos,
    EcoCertificate,
    QualityCertificate,
    SafetyDataSheet,
}

/// Minimum photo count for the multi-angle requirement
pub const MULTI_ANGLE_PHOTOS: usize = 4;

/// Certificate types a manager can ask for by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Eco,
    Quality,
    SafetyDataSheet,
}

/// How a field is judged present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, satisfied when non-empty after trimming
    Scalar,
    /// Satisfied when at least one element exists
    Collection,
    /// Satisfied when a value is set
    Numeric,
    /// Satisfied by at least this many photos
    PhotoCount(usize),
    /// Satisfied by a certificate tagged with this kind
    Document(DocumentKind),
}

impl FieldId {
    pub const ALL: [FieldId; 23] = [
        FieldId::Ean,
        FieldId::Title,
        FieldId::Description,
        FieldId::SupplierCategory,
        FieldId::Brand,
        FieldId::ShelfLife,
        FieldId::ProductSpecs,
        FieldId::PackageSpecs,
        FieldId::RtsPackageSpecs,
        FieldId::ProductSizeMaterial,
        FieldId::PackageSizeMaterial,
        FieldId::SupplyDate,
        FieldId::SupplyVolume,
        FieldId::CountryOfOrigin,
        FieldId::SalesForecast,
        FieldId::ProposedPrice,
        FieldId::RetailCenters,
        FieldId::Photos,
        FieldId::Certificates,
        FieldId::MultiAnglePhotos,
        FieldId::EcoCertificate,
        FieldId::QualityCertificate,
        FieldId::SafetyDataSheet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldId::Ean => "ean",
            FieldId::Title => "title",
            FieldId::Description => "description",
            FieldId::SupplierCategory => "supplierCategory",
            FieldId::Brand => "brand",
            FieldId::ShelfLife => "shelfLife",
            FieldId::ProductSpecs => "productSpecs",
            FieldId::PackageSpecs => "packageSpecs",
            FieldId::RtsPackageSpecs => "rtsPackageSpecs",
            FieldId::ProductSizeMaterial => "productSizeMaterial",
            FieldId::PackageSizeMaterial => "packageSizeMaterial",
            FieldId::SupplyDate => "supplyDate",
            FieldId::SupplyVolume => "supplyVolume",
            FieldId::CountryOfOrigin => "countryOfOrigin",
            FieldId::SalesForecast => "salesForecast",
            FieldId::ProposedPrice => "proposedPrice",
            FieldId::RetailCenters => "retailCenters",
            FieldId::Photos => "photos",
            FieldId::Certificates => "certificates",
            FieldId::MultiAnglePhotos => "multiAnglePhotos",
            FieldId::EcoCertificate => "ecoCertificate",
            FieldId::QualityCertificate => "qualityCertificate",
            FieldId::SafetyDataSheet => "safetyDataSheet",
        }
    }

    /// Human-readable requirement text used for new issues
    pub fn label(self) -> &'static str {
        match self {
            FieldId::Ean => "Provide the EAN barcode",
            FieldId::Title => "Provide the article title",
            FieldId::Description => "Describe the article",
            FieldId::SupplierCategory => "Choose a category",
            FieldId::Brand => "Provide the brand",
            FieldId::ShelfLife => "Provide the shelf life",
            FieldId::ProductSpecs => "Describe the product characteristics",
            FieldId::PackageSpecs => "Describe the package characteristics",
            FieldId::RtsPackageSpecs => "Describe the RTS package",
            FieldId::ProductSizeMaterial => "Provide product size and material",
            FieldId::PackageSizeMaterial => "Provide package size and material",
            FieldId::SupplyDate => "Provide the supply date",
            FieldId::SupplyVolume => "Provide the supply volume",
            FieldId::CountryOfOrigin => "Provide the country of origin",
            FieldId::SalesForecast => "Provide a sales forecast",
            FieldId::ProposedPrice => "Provide the proposed selling price",
            FieldId::RetailCenters => "Select the retail centres to supply",
            FieldId::Photos => "Attach product photos",
            FieldId::Certificates => "Attach certificates",
            FieldId::MultiAnglePhotos => "Attach photos from several angles (4+)",
            FieldId::EcoCertificate => "Attach an eco certificate",
            FieldId::QualityCertificate => "Attach a special quality certificate",
            FieldId::SafetyDataSheet => "Attach the MSDS / safety declaration",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::Photos | FieldId::Certificates | FieldId::RetailCenters => {
                FieldKind::Collection
            }
            FieldId::ProposedPrice => FieldKind::Numeric,
            FieldId::MultiAnglePhotos => FieldKind::PhotoCount(MULTI_ANGLE_PHOTOS),
            FieldId::EcoCertificate => FieldKind::Document(DocumentKind::Eco),
            FieldId::QualityCertificate => FieldKind::Document(DocumentKind::Quality),
            FieldId::SafetyDataSheet => FieldKind::Document(DocumentKind::SafetyDataSheet),
            _ => FieldKind::Scalar,
        }
    }

    /// Parse a list of identifiers, failing on the first unknown one.
    pub fn parse_list<S: AsRef<str>>(ids: &[S]) -> Result<Vec<FieldId>, WorkflowError> {
        ids.iter().map(|id| id.as_ref().parse()).collect()
    }

    /// Parse manager extras: preset ids (`msds`, `photos_multi`, ...) or field ids.
    pub fn parse_extras<S: AsRef<str>>(ids: &[S]) -> Result<Vec<FieldId>, WorkflowError> {
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                match id.parse::<ExtraPreset>() {
                    Ok(preset) => Ok(preset.field()),
                    Err(_) => id.parse(),
                }
            })
            .collect()
    }
}

/// Checklist of extra requirements offered to the manager during review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPreset {
    PhotosMulti,
    CertEco,
    CertQuality,
    CountryOrigin,
    Msds,
}

impl ExtraPreset {
    pub const ALL: [ExtraPreset; 5] = [
        ExtraPreset::PhotosMulti,
        ExtraPreset::CertEco,
        ExtraPreset::CertQuality,
        ExtraPreset::CountryOrigin,
        ExtraPreset::Msds,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ExtraPreset::PhotosMulti => "photos_multi",
            ExtraPreset::CertEco => "cert_eco",
            ExtraPreset::CertQuality => "cert_quality",
            ExtraPreset::CountryOrigin => "country_origin",
            ExtraPreset::Msds => "msds",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExtraPreset::PhotosMulti => "Photos from several angles (4+)",
            ExtraPreset::CertEco => "Eco certificate",
            ExtraPreset::CertQuality => "Special quality certificate",
            ExtraPreset::CountryOrigin => "Country of origin",
            ExtraPreset::Msds => "MSDS / safety declaration",
        }
    }

    /// The article check behind the preset
    pub fn field(self) -> FieldId {
        match self {
            ExtraPreset::PhotosMulti => FieldId::MultiAnglePhotos,
            ExtraPreset::CertEco => FieldId::EcoCertificate,
            ExtraPreset::CertQuality => FieldId::QualityCertificate,
            ExtraPreset::CountryOrigin => FieldId::CountryOfOrigin,
            ExtraPreset::Msds => FieldId::SafetyDataSheet,
        }
    }
}

impl FromStr for ExtraPreset {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ExtraPreset::ALL
            .iter()
            .copied()
            .find(|preset| preset.id() == needle)
            .ok_or_else(|| WorkflowError::UnknownField(needle.to_string()))
    }
}

impl FromStr for FieldId {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        FieldId::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == needle)
            .ok_or_else(|| WorkflowError::UnknownField(needle.to_string()))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
