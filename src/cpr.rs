//! CPR (Compact Position Reporting) global position decoding
//!
//! An airborne position message carries latitude/longitude quantized into
//! one of two interleaved grids ("even" and "odd"). One frame of each
//! parity pins down an unambiguous position anywhere on the globe.

/// Raw 17-bit CPR latitude/longitude fields from one position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprPayload {
    pub lat: u32,
    pub lon: u32,
}

/// One CPR zone is 2^17 counts wide.
const CPR_MAX: f64 = 131072.0;

const AIR_DLAT_EVEN: f64 = 360.0 / 60.0;
const AIR_DLAT_ODD: f64 = 360.0 / 59.0;

/// Combine an odd and an even position payload into latitude/longitude.
///
/// The even frame is taken as the more recent of the pair, so the returned
/// position sits on the even grid. Returns `None` when the two frames fall
/// in different longitude zone bands (aircraft crossed an NL boundary
/// between transmissions) or the solution is out of range.
pub fn global_position(odd: CprPayload, even: CprPayload) -> Option<(f64, f64)> {
    let lat_even = even.lat as f64 / CPR_MAX;
    let lon_even = even.lon as f64 / CPR_MAX;
    let lat_odd = odd.lat as f64 / CPR_MAX;
    let lon_odd = odd.lon as f64 / CPR_MAX;

    // Latitude zone index
    let j = (59.0 * lat_even - 60.0 * lat_odd + 0.5).floor() as i32;

    let mut rlat_even = AIR_DLAT_EVEN * (cpr_mod(j, 60) as f64 + lat_even);
    let mut rlat_odd = AIR_DLAT_ODD * (cpr_mod(j, 59) as f64 + lat_odd);

    if rlat_even >= 270.0 {
        rlat_even -= 360.0;
    }
    if rlat_odd >= 270.0 {
        rlat_odd -= 360.0;
    }

    // Both frames must agree on the longitude zone count
    let nl = cpr_nl(rlat_even);
    if nl != cpr_nl(rlat_odd) {
        return None;
    }

    let ni = nl.max(1);
    let m = (lon_even * (nl - 1) as f64 - lon_odd * nl as f64 + 0.5).floor() as i32;

    let mut lon = (360.0 / ni as f64) * (cpr_mod(m, ni) as f64 + lon_even);
    let lat = rlat_even;

    if lon > 180.0 {
        lon -= 360.0;
    }

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    Some((lat, lon))
}

/// CPR modulo function (always positive)
fn cpr_mod(a: i32, b: i32) -> i32 {
    let res = a % b;
    if res < 0 { res + b } else { res }
}

/// CPR NL function - number of longitude zones at given latitude
fn cpr_nl(lat: f64) -> i32 {
    let lat = lat.abs();

    if lat < 10.47047130 {
        59
    } else if lat < 14.82817437 {
        58
    } else if lat < 18.18626357 {
        57
    } else if lat < 21.02939493 {
        56
    } else if lat < 23.54504487 {
        55
    } else if lat < 25.82924707 {
        54
    } else if lat < 27.93898710 {
        53
    } else if lat < 29.91135686 {
        52
    } else if lat < 31.77209708 {
        51
    } else if lat < 33.53993436 {
        50
    } else if lat < 35.22899598 {
        49
    } else if lat < 36.85025108 {
        48
    } else if lat < 38.41241892 {
        47
    } else if lat < 39.92256684 {
        46
    } else if lat < 41.38651832 {
        45
    } else if lat < 42.80914012 {
        44
    } else if lat < 44.19454951 {
        43
    } else if lat < 45.54626723 {
        42
    } else if lat < 46.86733252 {
        41
    } else if lat < 48.16039128 {
        40
    } else if lat < 49.42776439 {
        39
    } else if lat < 50.67150166 {
        38
    } else if lat < 51.89342469 {
        37
    } else if lat < 53.09516153 {
        36
    } else if lat < 54.27817472 {
        35
    } else if lat < 55.44378444 {
        34
    } else if lat < 56.59318756 {
        33
    } else if lat < 57.72747354 {
        32
    } else if lat < 58.84763776 {
        31
    } else if lat < 59.95459277 {
        30
    } else if lat < 61.04917774 {
        29
    } else if lat < 62.13216659 {
        28
    } else if lat < 63.20427479 {
        27
    } else if lat < 64.26616523 {
        26
    } else if lat < 65.31845310 {
        25
    } else if lat < 66.36171008 {
        24
    } else if lat < 67.39646774 {
        23
    } else if lat < 68.42322022 {
        22
    } else if lat < 69.44242631 {
        21
    } else if lat < 70.45451075 {
        20
    } else if lat < 71.45986473 {
        19
    } else if lat < 72.45884545 {
        18
    } else if lat < 73.45177442 {
        17
    } else if lat < 74.43893416 {
        16
    } else if lat < 75.42056257 {
        15
    } else if lat < 76.39684391 {
        14
    } else if lat < 77.36789461 {
        13
    } else if lat < 78.33374083 {
        12
    } else if lat < 79.29428225 {
        11
    } else if lat < 80.24923213 {
        10
    } else if lat < 81.19801349 {
        9
    } else if lat < 82.13956981 {
        8
    } else if lat < 83.07199445 {
        7
    } else if lat < 83.99173563 {
        6
    } else if lat < 84.89166191 {
        5
    } else if lat < 85.75541621 {
        4
    } else if lat < 86.53536998 {
        3
    } else if lat < 87.00000000 {
        2
    } else {
        1
    }
}
