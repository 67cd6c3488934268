// rust/foldshard-core/src/encoding/tables.rs

//! Raw residue tables. Row order follows [`CANONICAL_RESIDUES`].

/// The 20 canonical amino acids, in table row order.
pub const CANONICAL_RESIDUES: &[u8; 20] = b"ARNDCQEGHILKMFPSTWYV";

/// Q8 DSSP secondary-structure codes, in channel order.
pub const Q8_CODES: &[u8; 8] = b"HBEGITS-";

/// First 11 principal components of the normalized AAindex1 properties
/// (Kawashima et al. 2008), one row per residue.
#[rustfmt::skip]
pub const AANDX_RED: [[f32; 11]; 20] = [
    [-0.0086, -0.1348,  0.4616, -0.0693,  0.1245, -0.0974,  0.1758,  0.0425,  0.2240,  0.1468, -0.0912], // A
    [ 0.1397,  0.3740, -0.0290, -0.0032, -0.4022,  0.3185,  0.1816,  0.3274, -0.1455,  0.4340, -0.2502], // R
    [ 0.2467, -0.0020, -0.1151,  0.2287, -0.0322, -0.1215, -0.1339, -0.3356, -0.0033, -0.2867, -0.1238], // N
    [ 0.3026,  0.0614, -0.0023,  0.0811,  0.2997, -0.1711, -0.4602,  0.0907, -0.1318,  0.0992, -0.0255], // D
    [-0.1503, -0.1747, -0.1930,  0.4813,  0.4372,  0.4583,  0.1800,  0.2741, -0.0785, -0.2256, -0.1828], // C
    [ 0.1270,  0.2193,  0.0536, -0.0103,  0.0349,  0.1008,  0.0496, -0.0220,  0.0287, -0.0725,  0.4633], // Q
    [ 0.2014,  0.2729,  0.3149, -0.1269,  0.3462, -0.1152, -0.2567,  0.2072, -0.1719,  0.0386, -0.0749], // E
    [ 0.2582, -0.5223,  0.0341,  0.2440, -0.2662, -0.4457,  0.2783,  0.2544, -0.2370,  0.1021,  0.0928], // G
    [ 0.0023,  0.2077, -0.1324,  0.1457,  0.0366, -0.0474,  0.2001, -0.5542, -0.2003,  0.2052, -0.2896], // H
    [-0.3345, -0.1388,  0.0757, -0.1287, -0.1306,  0.0775, -0.2226,  0.0080, -0.2496, -0.1335,  0.1711], // I
    [-0.2815, -0.0861,  0.3156, -0.2161, -0.0557, -0.0854,  0.0425, -0.0703,  0.1102, -0.2310, -0.4548], // L
    [ 0.1992,  0.3118,  0.1614, -0.0439, -0.2640,  0.0542,  0.2554,  0.0503,  0.0733, -0.6013,  0.1052], // K
    [-0.2663,  0.1253,  0.0926,  0.0394,  0.2740, -0.0860,  0.3623, -0.2100, -0.1066,  0.1995,  0.4918], // M
    [-0.3107,  0.0119, -0.1117, -0.0762, -0.0329, -0.1889, -0.0443, -0.1427, -0.0783,  0.1215, -0.1622], // F
    [ 0.2705, -0.2761, -0.4103, -0.7141,  0.2161,  0.1550,  0.2039, -0.0110, -0.0497, -0.0300, -0.0256], // P
    [ 0.2019, -0.1961,  0.0362,  0.1371, -0.0814,  0.1391, -0.0797, -0.2065,  0.3989,  0.0274, -0.0091], // S
    [ 0.0746, -0.1420,  0.0049,  0.0502, -0.1324,  0.2717, -0.2266, -0.1473,  0.4486,  0.2869,  0.1665], // T
    [-0.2810,  0.2159, -0.3641,  0.0102,  0.0718, -0.3854,  0.0207,  0.3707,  0.5100,  0.0159, -0.0143], // W
    [-0.1292,  0.0776, -0.3624,  0.0262, -0.2818, -0.1042, -0.2738, -0.0024, -0.1705, -0.1251,  0.1127], // Y
    [-0.2620, -0.2049,  0.1697, -0.0551, -0.1616,  0.2734, -0.2523,  0.0767, -0.1707,  0.0286,  0.1008], // V
];

/// JTT amino-acid exchange probabilities at P(0.01)
/// (Jones, Taylor and Thornton 1992). Row `i` is the distribution for residue `i`.
#[rustfmt::skip]
pub const JTT_P01: [[f32; 20]; 20] = [
    [0.98754, 0.00030, 0.00023, 0.00042, 0.00011, 0.00023, 0.00065, 0.00130, 0.00006, 0.00020, 0.00028, 0.00021, 0.00013, 0.00006, 0.00098, 0.00257, 0.00275, 0.00001, 0.00003, 0.00194], // A
    [0.00044, 0.98974, 0.00019, 0.00008, 0.00022, 0.00125, 0.00018, 0.00099, 0.00075, 0.00012, 0.00035, 0.00376, 0.00010, 0.00002, 0.00037, 0.00069, 0.00037, 0.00018, 0.00006, 0.00012], // R
    [0.00042, 0.00023, 0.98720, 0.00269, 0.00007, 0.00035, 0.00036, 0.00059, 0.00089, 0.00025, 0.00011, 0.00153, 0.00007, 0.00004, 0.00008, 0.00342, 0.00135, 0.00001, 0.00022, 0.00011], // N
    [0.00062, 0.00008, 0.00223, 0.98954, 0.00002, 0.00020, 0.00470, 0.00095, 0.00025, 0.00006, 0.00006, 0.00015, 0.00004, 0.00002, 0.00008, 0.00041, 0.00023, 0.00001, 0.00015, 0.00020], // D
    [0.00043, 0.00058, 0.00015, 0.00005, 0.99432, 0.00004, 0.00003, 0.00043, 0.00016, 0.00009, 0.00021, 0.00004, 0.00007, 0.00031, 0.00007, 0.00152, 0.00025, 0.00016, 0.00067, 0.00041], // C
    [0.00044, 0.00159, 0.00037, 0.00025, 0.00002, 0.98955, 0.00198, 0.00019, 0.00136, 0.00005, 0.00066, 0.00170, 0.00010, 0.00002, 0.00083, 0.00037, 0.00030, 0.00003, 0.00008, 0.00013], // Q
    [0.00080, 0.00015, 0.00025, 0.00392, 0.00001, 0.00130, 0.99055, 0.00087, 0.00006, 0.00006, 0.00009, 0.00105, 0.00004, 0.00002, 0.00009, 0.00021, 0.00019, 0.00001, 0.00002, 0.00029], // E
    [0.00136, 0.00070, 0.00035, 0.00067, 0.00012, 0.00011, 0.00074, 0.99350, 0.00005, 0.00003, 0.00006, 0.00016, 0.00003, 0.00002, 0.00013, 0.00137, 0.00020, 0.00008, 0.00003, 0.00031], // G
    [0.00021, 0.00168, 0.00165, 0.00057, 0.00014, 0.00241, 0.00016, 0.00017, 0.98864, 0.00009, 0.00051, 0.00027, 0.00008, 0.00016, 0.00058, 0.00050, 0.00027, 0.00001, 0.00182, 0.00008], // H
    [0.00029, 0.00011, 0.00020, 0.00006, 0.00003, 0.00004, 0.00007, 0.00004, 0.00004, 0.98729, 0.00209, 0.00012, 0.00113, 0.00035, 0.00005, 0.00027, 0.00142, 0.00001, 0.00010, 0.00627], // I
    [0.00023, 0.00019, 0.00005, 0.00004, 0.00005, 0.00029, 0.00006, 0.00005, 0.00013, 0.00122, 0.99330, 0.00008, 0.00092, 0.00099, 0.00052, 0.00040, 0.00015, 0.00007, 0.00008, 0.00118], // L
    [0.00027, 0.00331, 0.00111, 0.00014, 0.00001, 0.00118, 0.00111, 0.00020, 0.00011, 0.00011, 0.00013, 0.99100, 0.00015, 0.00002, 0.00011, 0.00032, 0.00060, 0.00001, 0.00003, 0.00009], // K
    [0.00042, 0.00023, 0.00013, 0.00008, 0.00006, 0.00018, 0.00011, 0.00011, 0.00007, 0.00255, 0.00354, 0.00038, 0.98818, 0.00017, 0.00008, 0.00020, 0.00131, 0.00003, 0.00006, 0.00212], // M
    [0.00011, 0.00003, 0.00004, 0.00002, 0.00015, 0.00002, 0.00003, 0.00004, 0.00009, 0.00047, 0.00227, 0.00002, 0.00010, 0.99360, 0.00009, 0.00063, 0.00007, 0.00008, 0.00171, 0.00041], // F
    [0.00148, 0.00038, 0.00007, 0.00008, 0.00003, 0.00067, 0.00011, 0.00018, 0.00026, 0.00006, 0.00093, 0.00012, 0.00004, 0.00007, 0.99270, 0.00194, 0.00069, 0.00001, 0.00003, 0.00015], // P
    [0.00287, 0.00052, 0.00212, 0.00031, 0.00044, 0.00022, 0.00018, 0.00146, 0.00017, 0.00021, 0.00054, 0.00027, 0.00007, 0.00037, 0.00144, 0.98556, 0.00276, 0.00005, 0.00020, 0.00025], // S
    [0.00360, 0.00033, 0.00098, 0.00020, 0.00008, 0.00021, 0.00020, 0.00024, 0.00011, 0.00131, 0.00024, 0.00060, 0.00053, 0.00005, 0.00060, 0.00324, 0.98665, 0.00002, 0.00007, 0.00074], // T
    [0.00007, 0.00065, 0.00003, 0.00002, 0.00023, 0.00008, 0.00006, 0.00040, 0.00002, 0.00005, 0.00048, 0.00006, 0.00006, 0.00021, 0.00003, 0.00024, 0.00007, 0.99686, 0.00023, 0.00017], // W
    [0.00008, 0.00010, 0.00030, 0.00024, 0.00041, 0.00010, 0.00004, 0.00006, 0.00130, 0.00017, 0.00022, 0.00005, 0.00004, 0.00214, 0.00005, 0.00043, 0.00012, 0.00010, 0.99392, 0.00011], // Y
    [0.00226, 0.00009, 0.00007, 0.00016, 0.00012, 0.00008, 0.00027, 0.00034, 0.00003, 0.00511, 0.00165, 0.00008, 0.00076, 0.00025, 0.00012, 0.00026, 0.00066, 0.00004, 0.00005, 0.98761], // V
];
