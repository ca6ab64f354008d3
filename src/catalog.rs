//! Built-in dataset catalogs. These tables are configuration data: every
//! entry names a remote archive in the portal's object storage together
//! with the descriptive metadata the created content object should carry.

use crate::domain::Genre;

/// Default object-storage root all dataset URLs are built against.
pub const DEFAULT_STORAGE_ROOT: &str =
    "https://swift.rc.nectar.org.au:8888/v1/AUTH_0bc40c2c2ff94a0b9404e6f960ae5677";

pub const TERRESTRIAL_TAG: &str = "Terrestrial datasets";
pub const FRESHWATER_TAG: &str = "Freshwater datasets";
pub const MARINE_TAG: &str = "Marine datasets";
pub const SUMMARY_TAG: &str = "Summary datasets";

/// A climate family enumerated as the cross-product of emission scenario,
/// model and year.
pub struct CombinationSpec {
    pub name: &'static str,
    pub container: &'static str,
    pub folder: &'static str,
    pub resolution: &'static str,
    pub file_template: &'static str,
    pub title_template: &'static str,
    pub subject: &'static [&'static str],
    pub emscs: &'static [&'static str],
    pub gcms: &'static [&'static str],
    pub years: &'static [&'static str],
    pub baseline: Option<BaselineSpec>,
}

/// Optional current-climate companion item for a combination family.
pub struct BaselineSpec {
    pub file: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub extra_subject: &'static [&'static str],
}

pub struct FixedSourceSpec {
    pub name: &'static str,
    pub layers: &'static [FixedLayerSpec],
}

pub struct FixedLayerSpec {
    pub folder: &'static str,
    pub container: &'static str,
    pub file: &'static str,
    pub title: &'static str,
    pub description: Option<&'static str>,
    pub external_description: Option<&'static str>,
    pub genre: Genre,
    pub resolution: &'static str,
    pub category: &'static str,
    pub subject: &'static [&'static str],
}

pub struct YearRangeSpec {
    pub name: &'static str,
    pub container: &'static str,
    pub folder: &'static str,
    pub file_template: &'static str,
    pub title_template: &'static str,
    pub first_year: u32,
    pub last_year: u32,
    pub genre: Genre,
    pub resolution: &'static str,
    pub category: &'static str,
    pub subject: &'static [&'static str],
}

pub struct OccurrenceSpec {
    pub id: &'static str,
    pub common_name: &'static str,
    pub csv: &'static str,
}

const AUSTRALIA_EMSCS: &[&str] = &[
    "RCP3PD", "RCP45", "RCP6", "RCP85", "SRESA1B", "SRESA1FI", "SRESA2", "SRESB1", "SRESB2",
];

const AUSTRALIA_GCMS: &[&str] = &[
    "cccma-cgcm31",
    "ccsr-miroc32hi",
    "ccsr-miroc32med",
    "cnrm-cm3",
    "csiro-mk30",
    "gfdl-cm20",
    "gfdl-cm21",
    "giss-modeleh",
    "giss-modeler",
    "iap-fgoals10g",
    "inm-cm30",
    "ipsl-cm4",
    "mpi-echam5",
    "mri-cgcm232a",
    "ncar-ccsm30",
    "ncar-pcm1",
    "ukmo-hadcm3",
    "ukmo-hadgem1",
];

const AUSTRALIA_YEARS: &[&str] = &[
    "2015", "2025", "2035", "2045", "2055", "2065", "2075", "2085",
];

const CURRENT_5KM_DESCRIPTION: &str = "Australia, current climate baseline of 1976 to 2005 - climate of 1990 - generated from aggregating monthly data from the Australian Water Availability Project, then aggregated to Bioclim variables according to the WorldClim methodology.";

static COMBINATION_SOURCES: &[CombinationSpec] = &[
    CombinationSpec {
        name: "australia-5km",
        container: "australia_5km",
        folder: "australia/australia_5km",
        resolution: "Resolution2_5m",
        file_template: "{emsc}_{gcm}_{year}.zip",
        title_template: "Australia, Climate Projection {emsc} based on {gcm}, 2.5 arcmin (~5 km) - {year}",
        subject: &[TERRESTRIAL_TAG],
        emscs: AUSTRALIA_EMSCS,
        gcms: AUSTRALIA_GCMS,
        years: AUSTRALIA_YEARS,
        baseline: Some(BaselineSpec {
            file: "current.zip",
            title: "Australia, Current Climate (1976-2005), 2.5 arcmin (~5 km)",
            description: CURRENT_5KM_DESCRIPTION,
            extra_subject: &[SUMMARY_TAG],
        }),
    },
    CombinationSpec {
        name: "australia-1km",
        container: "australia_1km",
        folder: "australia/australia_1km",
        resolution: "Resolution30s",
        file_template: "{emsc}_{gcm}_{year}.zip",
        title_template: "Australia, climate projection {emsc} based on {gcm}, 30 arcsec (~1 km) - {year}",
        subject: &[TERRESTRIAL_TAG],
        emscs: AUSTRALIA_EMSCS,
        gcms: AUSTRALIA_GCMS,
        years: AUSTRALIA_YEARS,
        baseline: Some(BaselineSpec {
            file: "current.76to05.zip",
            title: "Australia, current climate (1976-2005), 30 arcsec (~1 km)",
            description: CURRENT_5KM_DESCRIPTION,
            extra_subject: &[SUMMARY_TAG],
        }),
    },
    CombinationSpec {
        name: "australia-250m",
        container: "australia_250m",
        folder: "australia/australia_250m",
        resolution: "Resolution9s",
        file_template: "{emsc}_{gcm}_{year}.zip",
        title_template: "Australia, Climate Projection {emsc} based on {gcm}, 9 arcsec (~250 m) - {year}",
        subject: &[TERRESTRIAL_TAG],
        emscs: AUSTRALIA_EMSCS,
        gcms: AUSTRALIA_GCMS,
        years: AUSTRALIA_YEARS,
        baseline: None,
    },
];

static ENVIRONMENTAL_LAYERS: &[FixedLayerSpec] = &[
    FixedLayerSpec {
        folder: "environmental/aust_substrate_fertility",
        container: "aust-substrate-fertility",
        file: "australian_substrate_fertility.zip",
        title: "Australian Substrate Fertility, 36 arcsec (~1 km)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution36s",
        category: "substrate",
        subject: &[TERRESTRIAL_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/national_soil_grids",
        container: "national_soil_grids",
        file: "nsg-2011-250m.zip",
        title: "Australia, National Soil Grids (2012), 9 arcsec (~250 m)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "substrate",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/nvis_vegetation_groups",
        container: "nvis",
        file: "nvis_major_vegetation_groups.zip",
        title: "Australia, Major Vegetation Groups (2016), 3 arcsec (~90 m)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution3s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/vast",
        container: "vast",
        file: "vast.zip",
        title: "Australia, Vegetation Assets, States and Transitions (VAST Version 2), (2008), 30 arcmin (~50 km)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution30s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/mrrtf",
        container: "multi_res_ridge_top_flat",
        file: "multi_res_ridge_top_flat.zip",
        title: "Australia, Multi-resolution Ridge Top Flatness (MrRTF), (2000), 3 arcsec (~90 m)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution3s",
        category: "topography",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/mrvbf",
        container: "multi_res_valley_bottom_flat",
        file: "multi_res_valley_bottom_flat.zip",
        title: "Australia, Multi-resolution Valley Bottom Flatness (MrVBF), (2000), 3 arcsec (~90 m)",
        description: None,
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution3s",
        category: "topography",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/gpet",
        container: "glob_pet_and_aridity",
        file: "global-pet-and-aridity.zip",
        title: "Global, Potential Evapotranspiration and Aridity (1950-2000), 30 arcsec (~1 km)",
        description: Some("Modeled using the monthly average data (1950-2000) available from the WorldClim Global Climate Data."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution30s",
        category: "hydrology",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
];

static LANDCOVER_LAYERS: &[FixedLayerSpec] = &[
    FixedLayerSpec {
        folder: "environmental/ndlc",
        container: "national-dynamic-land-cover",
        file: "ndlc_DLCDv1_Class.zip",
        title: "Australia, Dynamic Land Cover (2000-2008), 9 arcsec (~250 m)",
        description: Some("Observed biophysical cover on the Earth's surface."),
        external_description: Some("The Dynamic Land Cover Dataset of Australia is the first nationally consistent and thematically comprehensive land cover reference for Australia, presenting land cover information for every 250m by 250m area of the country from April 2000 to April 2008."),
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "landcover",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/ndlc",
        container: "national-dynamic-land-cover",
        file: "ndlc_trend_evi.zip",
        title: "Australia, Enhanced Vegetation Index (2000-2008), 9 arcsec (~250 m)",
        description: Some("Index for the greenness of the vegetation, which is directly related to the amount of photosynthesis occurring."),
        external_description: Some("The Enhanced Vegetation Index data is part of the Australian Dynamic Land Cover dataset, presenting land cover information for every 250m by 250m area of the country from April 2000 to April 2008."),
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "landcover",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
];

static MARINE_LAYERS: &[FixedLayerSpec] = &[
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.Temperature.zip",
        title: "Global Marine Surface Data, Water Temperature (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface temperature for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "physical",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.Salinity.zip",
        title: "Global Marine Surface Data, Water Salinity (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface salinity for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "physical",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.Nitrate.zip",
        title: "Global Marine Surface Data, Nitrate (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface nitrate concentration for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "nutrients",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.Chlorophyll.zip",
        title: "Global Marine Surface Data, Chlorophyll (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface chlorophyll A concentration for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "biochemical",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.pH.zip",
        title: "Global Marine Surface Data, pH (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface pH for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "biochemical",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/global_marine",
        container: "global_marine",
        file: "Present.Surface.Primary.productivity.zip",
        title: "Global Marine Surface Data, Primary Productivity (2000-2014), 5 arcmin (~10 km)",
        description: Some("Global data for sea surface primary productivity for present time period (2000-2014)."),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution5m",
        category: "biochemical",
        subject: &[SUMMARY_TAG, MARINE_TAG],
    },
];

static GPP_LAYERS: &[FixedLayerSpec] = &[
    FixedLayerSpec {
        folder: "environmental/gpp",
        container: "gpp",
        file: "gpp_maxmin_2000_2007.zip",
        title: "Australia, Gross Primary Productivity (2000-2007) (min, max & mean), 30 arcsec (~1 km)",
        description: Some("Data aggregated over period 2000 - 2007"),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/gpp",
        container: "gpp",
        file: "gpp_summary_00_07.zip",
        title: "Australia, Gross Primary Productivity (2000-2007) (coefficient of variation), 30 arcsec (~1 km)",
        description: Some("Data aggregated over yearly averages from 2000 - 2007"),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG, SUMMARY_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/gpp",
        container: "gpp",
        file: "gppyr_2000_01_molco2m2yr_m.zip",
        title: "Australia, Gross Primary Productivity for 2000 (annual mean), 30 arcsec (~1 km)",
        description: Some("Data for year 2000"),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/gpp",
        container: "gpp",
        file: "gppyr_2001_02_molco2m2yr_m.zip",
        title: "Australia, Gross Primary Productivity for 2001 (annual mean), 30 arcsec (~1 km)",
        description: Some("Data for year 2001"),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG],
    },
    FixedLayerSpec {
        folder: "environmental/gpp",
        container: "gpp",
        file: "gppyr_2002_03_molco2m2yr_m.zip",
        title: "Australia, Gross Primary Productivity for 2002 (annual mean), 30 arcsec (~1 km)",
        description: Some("Data for year 2002"),
        external_description: None,
        genre: Genre::Environmental,
        resolution: "Resolution9s",
        category: "vegetation",
        subject: &[TERRESTRIAL_TAG],
    },
];

static FIXED_SOURCES: &[FixedSourceSpec] = &[
    FixedSourceSpec {
        name: "environmental",
        layers: ENVIRONMENTAL_LAYERS,
    },
    FixedSourceSpec {
        name: "landcover",
        layers: LANDCOVER_LAYERS,
    },
    FixedSourceSpec {
        name: "global-marine",
        layers: MARINE_LAYERS,
    },
    FixedSourceSpec {
        name: "gpp",
        layers: GPP_LAYERS,
    },
];

static YEAR_RANGE_SOURCES: &[YearRangeSpec] = &[YearRangeSpec {
    name: "awap",
    container: "awap",
    folder: "environmental/awap",
    file_template: "awap_ann_{year}1231.zip",
    title_template: "Australia, Water Availability, 30 arcsec (~1 km) {year}",
    first_year: 1900,
    last_year: 2010,
    genre: Genre::Environmental,
    resolution: "Resolution3m",
    category: "hydrology",
    subject: &[FRESHWATER_TAG],
}];

static OCCURRENCE_DATASETS: &[OccurrenceSpec] = &[
    OccurrenceSpec {
        id: "koala",
        common_name: "Koala",
        csv: include_str!("../data/species/koala/occur.csv"),
    },
    OccurrenceSpec {
        id: "platypus",
        common_name: "Platypus",
        csv: include_str!("../data/species/platypus/occur.csv"),
    },
];

pub fn combination_sources() -> &'static [CombinationSpec] {
    COMBINATION_SOURCES
}

pub fn fixed_sources() -> &'static [FixedSourceSpec] {
    FIXED_SOURCES
}

pub fn year_range_sources() -> &'static [YearRangeSpec] {
    YEAR_RANGE_SOURCES
}

pub fn occurrence_datasets() -> &'static [OccurrenceSpec] {
    OCCURRENCE_DATASETS
}

/// Every source name the CLI accepts for `--source`.
pub fn source_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = COMBINATION_SOURCES.iter().map(|spec| spec.name).collect();
    names.extend(FIXED_SOURCES.iter().map(|spec| spec.name));
    names.extend(YEAR_RANGE_SOURCES.iter().map(|spec| spec.name));
    names.push("species-occurrences");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_names_are_unique() {
        let names = source_names();
        let mut dedup = names.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
    }

    #[test]
    fn combination_dimensions_are_nonempty() {
        for spec in combination_sources() {
            assert!(!spec.emscs.is_empty());
            assert!(!spec.gcms.is_empty());
            assert!(!spec.years.is_empty());
        }
    }

    #[test]
    fn gpp_descriptions_are_distinct() {
        let layers = fixed_sources()
            .iter()
            .find(|spec| spec.name == "gpp")
            .unwrap()
            .layers;
        assert_eq!(
            layers[0].description,
            Some("Data aggregated over period 2000 - 2007")
        );
        assert_eq!(
            layers[1].description,
            Some("Data aggregated over yearly averages from 2000 - 2007")
        );
    }
}
