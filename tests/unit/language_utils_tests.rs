/*!
 * Tests for language utility functions
 */

use chunkwise::language_utils::{
    LanguageCodeType, get_language_name, normalize_to_part2t, validate_language_code, validate_regional_variant,
};

/// Test validation of the supported code forms
#[test]
fn test_validate_language_code_withKnownCodes_shouldReturnType() {
    assert_eq!(validate_language_code("en").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("FR").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("spa").unwrap(), LanguageCodeType::Part2T);
    assert_eq!(validate_language_code("ger").unwrap(), LanguageCodeType::Part2B);
}

#[test]
fn test_validate_language_code_withUnknownCodes_shouldFail() {
    assert!(validate_language_code("xx").is_err());
    assert!(validate_language_code("english").is_err());
    assert!(validate_language_code("").is_err());
}

/// Test normalisation to ISO 639-2/T
#[test]
fn test_normalize_to_part2t_withEachForm_shouldReturnTerminologyCode() {
    assert_eq!(normalize_to_part2t("pt").unwrap(), "por");
    assert_eq!(normalize_to_part2t("deu").unwrap(), "deu");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
}

#[test]
fn test_get_language_name_withValidCode_shouldReturnEnglishName() {
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("ja").unwrap(), "Japanese");
    assert!(get_language_name("zz").is_err());
}

/// Region subtags are two letters or three digits
#[test]
fn test_validate_regional_variant_withVariousInputs_shouldAcceptOnlySubtags() {
    assert!(validate_regional_variant("BR").is_ok());
    assert!(validate_regional_variant("419").is_ok());
    assert!(validate_regional_variant("br").is_ok());
    assert!(validate_regional_variant("BRA").is_err());
    assert!(validate_regional_variant("4a9").is_err());
    assert!(validate_regional_variant("").is_err());
}
