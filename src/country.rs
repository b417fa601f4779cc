//! Country name and ISO code lookup.
//!
//! The World Bank API is keyed by ISO 3166-1 alpha-3 codes while ReliefWeb,
//! GNews and ACLED are queried by English country name, so every request
//! resolves its country once up front.
//!
//! [`COUNTRIES`] holds every ISO 3166-1 entry under its common English
//! name. ISO short names and other spellings in wide use ("Viet Nam",
//! "Korea, Republic of", "Ivory Coast") resolve through [`ALIASES`].

use anyhow::{bail, Result};
use serde::Serialize;

/// An ISO 3166-1 country or territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub name: &'static str,
    pub alpha2: &'static str,
    pub alpha3: &'static str,
}

macro_rules! countries {
    ($(($name:expr, $a2:expr, $a3:expr)),* $(,)?) => {
        &[$(Country { name: $name, alpha2: $a2, alpha3: $a3 }),*]
    };
}

/// All ISO 3166-1 countries, ordered by name.
pub const COUNTRIES: &[Country] = countries![
    ("Afghanistan", "AF", "AFG"),
    ("Åland Islands", "AX", "ALA"),
    ("Albania", "AL", "ALB"),
    ("Algeria", "DZ", "DZA"),
    ("American Samoa", "AS", "ASM"),
    ("Andorra", "AD", "AND"),
    ("Angola", "AO", "AGO"),
    ("Anguilla", "AI", "AIA"),
    ("Antarctica", "AQ", "ATA"),
    ("Antigua and Barbuda", "AG", "ATG"),
    ("Argentina", "AR", "ARG"),
    ("Armenia", "AM", "ARM"),
    ("Aruba", "AW", "ABW"),
    ("Australia", "AU", "AUS"),
    ("Austria", "AT", "AUT"),
    ("Azerbaijan", "AZ", "AZE"),
    ("Bahamas", "BS", "BHS"),
    ("Bahrain", "BH", "BHR"),
    ("Bangladesh", "BD", "BGD"),
    ("Barbados", "BB", "BRB"),
    ("Belarus", "BY", "BLR"),
    ("Belgium", "BE", "BEL"),
    ("Belize", "BZ", "BLZ"),
    ("Benin", "BJ", "BEN"),
    ("Bermuda", "BM", "BMU"),
    ("Bhutan", "BT", "BTN"),
    ("Bolivia", "BO", "BOL"),
    ("Bonaire, Sint Eustatius and Saba", "BQ", "BES"),
    ("Bosnia and Herzegovina", "BA", "BIH"),
    ("Botswana", "BW", "BWA"),
    ("Bouvet Island", "BV", "BVT"),
    ("Brazil", "BR", "BRA"),
    ("British Indian Ocean Territory", "IO", "IOT"),
    ("Brunei Darussalam", "BN", "BRN"),
    ("Bulgaria", "BG", "BGR"),
    ("Burkina Faso", "BF", "BFA"),
    ("Burundi", "BI", "BDI"),
    ("Cabo Verde", "CV", "CPV"),
    ("Cambodia", "KH", "KHM"),
    ("Cameroon", "CM", "CMR"),
    ("Canada", "CA", "CAN"),
    ("Cayman Islands", "KY", "CYM"),
    ("Central African Republic", "CF", "CAF"),
    ("Chad", "TD", "TCD"),
    ("Chile", "CL", "CHL"),
    ("China", "CN", "CHN"),
    ("Christmas Island", "CX", "CXR"),
    ("Cocos (Keeling) Islands", "CC", "CCK"),
    ("Colombia", "CO", "COL"),
    ("Comoros", "KM", "COM"),
    ("Congo", "CG", "COG"),
    ("Cook Islands", "CK", "COK"),
    ("Costa Rica", "CR", "CRI"),
    ("Côte d'Ivoire", "CI", "CIV"),
    ("Croatia", "HR", "HRV"),
    ("Cuba", "CU", "CUB"),
    ("Curaçao", "CW", "CUW"),
    ("Cyprus", "CY", "CYP"),
    ("Czechia", "CZ", "CZE"),
    ("Democratic Republic of the Congo", "CD", "COD"),
    ("Denmark", "DK", "DNK"),
    ("Djibouti", "DJ", "DJI"),
    ("Dominica", "DM", "DMA"),
    ("Dominican Republic", "DO", "DOM"),
    ("Ecuador", "EC", "ECU"),
    ("Egypt", "EG", "EGY"),
    ("El Salvador", "SV", "SLV"),
    ("Equatorial Guinea", "GQ", "GNQ"),
    ("Eritrea", "ER", "ERI"),
    ("Estonia", "EE", "EST"),
    ("Eswatini", "SZ", "SWZ"),
    ("Ethiopia", "ET", "ETH"),
    ("Falkland Islands (Malvinas)", "FK", "FLK"),
    ("Faroe Islands", "FO", "FRO"),
    ("Fiji", "FJ", "FJI"),
    ("Finland", "FI", "FIN"),
    ("France", "FR", "FRA"),
    ("French Guiana", "GF", "GUF"),
    ("French Polynesia", "PF", "PYF"),
    ("French Southern Territories", "TF", "ATF"),
    ("Gabon", "GA", "GAB"),
    ("Gambia", "GM", "GMB"),
    ("Georgia", "GE", "GEO"),
    ("Germany", "DE", "DEU"),
    ("Ghana", "GH", "GHA"),
    ("Gibraltar", "GI", "GIB"),
    ("Greece", "GR", "GRC"),
    ("Greenland", "GL", "GRL"),
    ("Grenada", "GD", "GRD"),
    ("Guadeloupe", "GP", "GLP"),
    ("Guam", "GU", "GUM"),
    ("Guatemala", "GT", "GTM"),
    ("Guernsey", "GG", "GGY"),
    ("Guinea", "GN", "GIN"),
    ("Guinea-Bissau", "GW", "GNB"),
    ("Guyana", "GY", "GUY"),
    ("Haiti", "HT", "HTI"),
    ("Heard Island and McDonald Islands", "HM", "HMD"),
    ("Holy See", "VA", "VAT"),
    ("Honduras", "HN", "HND"),
    ("Hong Kong", "HK", "HKG"),
    ("Hungary", "HU", "HUN"),
    ("Iceland", "IS", "ISL"),
    ("India", "IN", "IND"),
    ("Indonesia", "ID", "IDN"),
    ("Iran", "IR", "IRN"),
    ("Iraq", "IQ", "IRQ"),
    ("Ireland", "IE", "IRL"),
    ("Isle of Man", "IM", "IMN"),
    ("Israel", "IL", "ISR"),
    ("Italy", "IT", "ITA"),
    ("Jamaica", "JM", "JAM"),
    ("Japan", "JP", "JPN"),
    ("Jersey", "JE", "JEY"),
    ("Jordan", "JO", "JOR"),
    ("Kazakhstan", "KZ", "KAZ"),
    ("Kenya", "KE", "KEN"),
    ("Kiribati", "KI", "KIR"),
    ("Kuwait", "KW", "KWT"),
    ("Kyrgyzstan", "KG", "KGZ"),
    ("Laos", "LA", "LAO"),
    ("Latvia", "LV", "LVA"),
    ("Lebanon", "LB", "LBN"),
    ("Lesotho", "LS", "LSO"),
    ("Liberia", "LR", "LBR"),
    ("Libya", "LY", "LBY"),
    ("Liechtenstein", "LI", "LIE"),
    ("Lithuania", "LT", "LTU"),
    ("Luxembourg", "LU", "LUX"),
    ("Macao", "MO", "MAC"),
    ("Madagascar", "MG", "MDG"),
    ("Malawi", "MW", "MWI"),
    ("Malaysia", "MY", "MYS"),
    ("Maldives", "MV", "MDV"),
    ("Mali", "ML", "MLI"),
    ("Malta", "MT", "MLT"),
    ("Marshall Islands", "MH", "MHL"),
    ("Martinique", "MQ", "MTQ"),
    ("Mauritania", "MR", "MRT"),
    ("Mauritius", "MU", "MUS"),
    ("Mayotte", "YT", "MYT"),
    ("Mexico", "MX", "MEX"),
    ("Micronesia", "FM", "FSM"),
    ("Moldova", "MD", "MDA"),
    ("Monaco", "MC", "MCO"),
    ("Mongolia", "MN", "MNG"),
    ("Montenegro", "ME", "MNE"),
    ("Montserrat", "MS", "MSR"),
    ("Morocco", "MA", "MAR"),
    ("Mozambique", "MZ", "MOZ"),
    ("Myanmar", "MM", "MMR"),
    ("Namibia", "NA", "NAM"),
    ("Nauru", "NR", "NRU"),
    ("Nepal", "NP", "NPL"),
    ("Netherlands", "NL", "NLD"),
    ("New Caledonia", "NC", "NCL"),
    ("New Zealand", "NZ", "NZL"),
    ("Nicaragua", "NI", "NIC"),
    ("Niger", "NE", "NER"),
    ("Nigeria", "NG", "NGA"),
    ("Niue", "NU", "NIU"),
    ("Norfolk Island", "NF", "NFK"),
    ("North Korea", "KP", "PRK"),
    ("North Macedonia", "MK", "MKD"),
    ("Northern Mariana Islands", "MP", "MNP"),
    ("Norway", "NO", "NOR"),
    ("Oman", "OM", "OMN"),
    ("Pakistan", "PK", "PAK"),
    ("Palau", "PW", "PLW"),
    ("Palestine", "PS", "PSE"),
    ("Panama", "PA", "PAN"),
    ("Papua New Guinea", "PG", "PNG"),
    ("Paraguay", "PY", "PRY"),
    ("Peru", "PE", "PER"),
    ("Philippines", "PH", "PHL"),
    ("Pitcairn", "PN", "PCN"),
    ("Poland", "PL", "POL"),
    ("Portugal", "PT", "PRT"),
    ("Puerto Rico", "PR", "PRI"),
    ("Qatar", "QA", "QAT"),
    ("Réunion", "RE", "REU"),
    ("Romania", "RO", "ROU"),
    ("Russia", "RU", "RUS"),
    ("Rwanda", "RW", "RWA"),
    ("Saint Barthélemy", "BL", "BLM"),
    ("Saint Helena, Ascension and Tristan da Cunha", "SH", "SHN"),
    ("Saint Kitts and Nevis", "KN", "KNA"),
    ("Saint Lucia", "LC", "LCA"),
    ("Saint Martin (French part)", "MF", "MAF"),
    ("Saint Pierre and Miquelon", "PM", "SPM"),
    ("Saint Vincent and the Grenadines", "VC", "VCT"),
    ("Samoa", "WS", "WSM"),
    ("San Marino", "SM", "SMR"),
    ("Sao Tome and Principe", "ST", "STP"),
    ("Saudi Arabia", "SA", "SAU"),
    ("Senegal", "SN", "SEN"),
    ("Serbia", "RS", "SRB"),
    ("Seychelles", "SC", "SYC"),
    ("Sierra Leone", "SL", "SLE"),
    ("Singapore", "SG", "SGP"),
    ("Sint Maarten (Dutch part)", "SX", "SXM"),
    ("Slovakia", "SK", "SVK"),
    ("Slovenia", "SI", "SVN"),
    ("Solomon Islands", "SB", "SLB"),
    ("Somalia", "SO", "SOM"),
    ("South Africa", "ZA", "ZAF"),
    ("South Georgia and the South Sandwich Islands", "GS", "SGS"),
    ("South Korea", "KR", "KOR"),
    ("South Sudan", "SS", "SSD"),
    ("Spain", "ES", "ESP"),
    ("Sri Lanka", "LK", "LKA"),
    ("Sudan", "SD", "SDN"),
    ("Suriname", "SR", "SUR"),
    ("Svalbard and Jan Mayen", "SJ", "SJM"),
    ("Sweden", "SE", "SWE"),
    ("Switzerland", "CH", "CHE"),
    ("Syria", "SY", "SYR"),
    ("Taiwan", "TW", "TWN"),
    ("Tajikistan", "TJ", "TJK"),
    ("Tanzania", "TZ", "TZA"),
    ("Thailand", "TH", "THA"),
    ("Timor-Leste", "TL", "TLS"),
    ("Togo", "TG", "TGO"),
    ("Tokelau", "TK", "TKL"),
    ("Tonga", "TO", "TON"),
    ("Trinidad and Tobago", "TT", "TTO"),
    ("Tunisia", "TN", "TUN"),
    ("Turkey", "TR", "TUR"),
    ("Turkmenistan", "TM", "TKM"),
    ("Turks and Caicos Islands", "TC", "TCA"),
    ("Tuvalu", "TV", "TUV"),
    ("Uganda", "UG", "UGA"),
    ("Ukraine", "UA", "UKR"),
    ("United Arab Emirates", "AE", "ARE"),
    ("United Kingdom", "GB", "GBR"),
    ("United States", "US", "USA"),
    ("United States Minor Outlying Islands", "UM", "UMI"),
    ("Uruguay", "UY", "URY"),
    ("Uzbekistan", "UZ", "UZB"),
    ("Vanuatu", "VU", "VUT"),
    ("Venezuela", "VE", "VEN"),
    ("Vietnam", "VN", "VNM"),
    ("Virgin Islands (British)", "VG", "VGB"),
    ("Virgin Islands (U.S.)", "VI", "VIR"),
    ("Wallis and Futuna", "WF", "WLF"),
    ("Western Sahara", "EH", "ESH"),
    ("Yemen", "YE", "YEM"),
    ("Zambia", "ZM", "ZMB"),
    ("Zimbabwe", "ZW", "ZWE"),
];

/// Alternative names mapped to alpha-3 codes.
pub const ALIASES: &[(&str, &str)] = &[
    ("Aland Islands", "ALA"),
    ("Bolivia, Plurinational State of", "BOL"),
    ("Brunei", "BRN"),
    ("Burma", "MMR"),
    ("Cape Verde", "CPV"),
    ("Congo, The Democratic Republic of the", "COD"),
    ("DR Congo", "COD"),
    ("DRC", "COD"),
    ("Republic of the Congo", "COG"),
    ("Cote d'Ivoire", "CIV"),
    ("Ivory Coast", "CIV"),
    ("Curacao", "CUW"),
    ("Czech Republic", "CZE"),
    ("East Timor", "TLS"),
    ("Falkland Islands", "FLK"),
    ("Gambia, The", "GMB"),
    ("Holy See (Vatican City State)", "VAT"),
    ("Vatican City", "VAT"),
    ("Iran, Islamic Republic of", "IRN"),
    ("Korea, Democratic People's Republic of", "PRK"),
    ("Korea, Republic of", "KOR"),
    ("Lao People's Democratic Republic", "LAO"),
    ("Macau", "MAC"),
    ("Micronesia, Federated States of", "FSM"),
    ("Moldova, Republic of", "MDA"),
    ("Macedonia", "MKD"),
    ("Palestine, State of", "PSE"),
    ("State of Palestine", "PSE"),
    ("Occupied Palestinian Territory", "PSE"),
    ("Reunion", "REU"),
    ("Russian Federation", "RUS"),
    ("Saint Barthelemy", "BLM"),
    ("Swaziland", "SWZ"),
    ("Syrian Arab Republic", "SYR"),
    ("Taiwan, Province of China", "TWN"),
    ("Tanzania, United Republic of", "TZA"),
    ("Turkiye", "TUR"),
    ("Türkiye", "TUR"),
    ("UK", "GBR"),
    ("United States of America", "USA"),
    ("USA", "USA"),
    ("Venezuela, Bolivarian Republic of", "VEN"),
    ("Viet Nam", "VNM"),
];

fn by_alpha3(alpha3: &str) -> Option<Country> {
    COUNTRIES.iter().find(|c| c.alpha3 == alpha3).copied()
}

/// Resolve a country by English name, alias, alpha-2, or alpha-3 code.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// ```rust
/// use ngo_report::country::lookup;
///
/// assert_eq!(lookup("kenya").unwrap().alpha3, "KEN");
/// assert_eq!(lookup("KE").unwrap().name, "Kenya");
/// assert_eq!(lookup("Viet Nam").unwrap().name, "Vietnam");
/// assert!(lookup("Atlantis").is_err());
/// ```
pub fn lookup(query: &str) -> Result<Country> {
    let q = query.trim();
    if q.is_empty() {
        bail!("country must not be empty");
    }
    let lowered = q.to_lowercase();
    let found = COUNTRIES
        .iter()
        .find(|c| {
            c.name.to_lowercase() == lowered
                || c.alpha2.eq_ignore_ascii_case(q)
                || c.alpha3.eq_ignore_ascii_case(q)
        })
        .copied()
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias.to_lowercase() == lowered)
                .and_then(|(_, alpha3)| by_alpha3(alpha3))
        });
    found.ok_or_else(|| anyhow::anyhow!("unknown country: '{}'", q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_codes() {
        let by_name = lookup("Kenya").unwrap();
        assert_eq!(by_name, lookup("KEN").unwrap());
        assert_eq!(by_name, lookup(" ke ").unwrap());
    }

    #[test]
    fn test_lookup_covers_all_member_states() {
        for (name, alpha3) in [
            ("Liberia", "LBR"),
            ("Morocco", "MAR"),
            ("Guinea", "GIN"),
            ("Tunisia", "TUN"),
            ("Vietnam", "VNM"),
            ("Ecuador", "ECU"),
            ("Togo", "TGO"),
            ("Djibouti", "DJI"),
        ] {
            assert_eq!(lookup(name).unwrap().alpha3, alpha3, "{}", name);
        }
        assert_eq!(lookup("CIV").unwrap().name, "Côte d'Ivoire");
        assert_eq!(lookup("côte d'ivoire").unwrap().alpha2, "CI");
    }

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("Viet Nam").unwrap().name, "Vietnam");
        assert_eq!(lookup("korea, republic of").unwrap().alpha3, "KOR");
        assert_eq!(lookup("Ivory Coast").unwrap().alpha3, "CIV");
        assert_eq!(lookup("DRC").unwrap().name, "Democratic Republic of the Congo");
        assert_eq!(lookup("Russian Federation").unwrap().name, "Russia");
    }

    #[test]
    fn test_lookup_unknown() {
        let err = lookup("Narnia").unwrap_err();
        assert!(err.to_string().contains("Narnia"));
    }

    #[test]
    fn test_lookup_empty() {
        assert!(lookup("   ").is_err());
    }

    #[test]
    fn test_table_is_complete_and_codes_unique() {
        assert_eq!(COUNTRIES.len(), 249);

        let mut a2: Vec<&str> = COUNTRIES.iter().map(|c| c.alpha2).collect();
        a2.sort();
        a2.dedup();
        assert_eq!(a2.len(), COUNTRIES.len());

        let mut a3: Vec<&str> = COUNTRIES.iter().map(|c| c.alpha3).collect();
        a3.sort();
        a3.dedup();
        assert_eq!(a3.len(), COUNTRIES.len());
    }

    #[test]
    fn test_aliases_point_at_known_codes() {
        for (alias, alpha3) in ALIASES {
            assert!(by_alpha3(alpha3).is_some(), "{} -> {}", alias, alpha3);
        }
    }
}
