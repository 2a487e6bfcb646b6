// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Text sanitization before persistence
//!
//! Stored text is restricted to ASCII: accented Latin letters lose their
//! accent, anything else without an ASCII form becomes `?`.

/// Transliterate to ASCII. Idempotent.
pub fn sanitize(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    text.chars().map(transliterate).collect()
}

fn transliterate(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        '¡' => '!',
        '¿' => '?',
        '°' | 'º' => 'o',
        'ª' => 'a',
        '\u{00A0}' => ' ',
        _ => '?',
    }
}
