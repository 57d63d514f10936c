//! Static calibration data.
//!
//! All EQ curves are magnitude responses sampled on a 256-point transform at
//! 48 kHz: entry `k` sits at `k * 187.5` Hz, 129 entries from DC to Nyquist.
//! They are resampled to the running sample rate by
//! [`crate::dsp::calibration::EqTable`].

/// Sample rate the curves below were measured at.
pub const TABLE_SAMPLE_RATE: f64 = 48_000.0;

/// Transform size the curves below were measured with.
pub const TABLE_FFT_SIZE: usize = 256;

/// Entries per curve (`TABLE_FFT_SIZE / 2 + 1`).
pub const TABLE_LEN: usize = TABLE_FFT_SIZE / 2 + 1;

/// Absolute threshold of hearing (dB), per transform cell.
///
/// The DC entry is pinned at +120 dB so the inverse weighting removes it.
/// The source measurement lists -120 dB there, which would boost DC by 10^12.
pub const ATH_DB: [f64; TABLE_LEN] = [
    120.0, 10.501441764508407, 4.570300728103248, 2.326269900258007,
    1.081846054799787, 0.23626622513140116, -0.4351700862129402, -1.0453238125790598,
    -1.662699361301646, -2.331709160732461, -3.077416779401511, -3.9045478590859717,
    -4.79530126336542, -5.708910865520167, -6.584942764925055, -7.351110723073354,
    -7.934888344756869, -8.276735814906893, -8.341850723026962, -8.127401022816782,
    -7.6632780999731995, -7.006185035895964, -6.2287234042789485, -5.4064063576973265,
    -4.605800757446577, -3.87628536341062, -3.246571428989692, -2.7257054110768486,
    -2.307233025313461, -1.9747861471083932, -1.707524665516448, -1.4844019704613045,
    -1.2868500717836535, -1.0999852228237663, -0.9127194164264618, -0.7172354825467648,
    -0.508213393788052, -0.2820650251323511, -0.03630656799077103, 0.23089587431235925,
    0.5210249340485178, 0.8353928144358371, 1.1752430665530853, 1.5418041159866083,
    1.936315637485714, 2.3600407235907093, 2.814271107073623, 3.300329200932602,
    3.819568772888758, 4.373375074824322, 4.963164774416102, 5.590385826553089,
    6.2565173351275085, 6.963069421940318, 7.711583107154283, 8.503630201601867,
    9.340813210043816, 10.224765244228015, 11.157149944641485, 12.139661409964086,
    13.17402413335223, 14.261992944790844, 15.405352958847033, 16.605919527241447,
    17.865538195724888, 19.18608466480861, 20.569464753951213, 22.017614368850328,
    23.53249947152834, 25.116116052936277, 26.770490107831318, 28.49767761170891,
    30.29976449959623, 32.17886664653279, 34.13712984958302, 36.176729811241614,
    38.2998721241072, 40.50879225671206, 42.80575554040667, 45.19305715720841,
    47.67302212853255, 50.248005304731066, 52.92039135537239, 55.69259476020069,
    58.56705980072148, 61.546260552360174, 64.63270087715188, 67.82891441691814,
    71.13746458689403, 74.56094456977131, 78.10197731012526, 81.76321550919855,
    85.54734162001218, 89.45706784278366, 93.49513612062727, 97.6643181355168,
    101.96741530449326, 106.40725877609921, 110.98670942702392, 115.70865785894628,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0, 120.0, 120.0, 120.0,
    120.0,
];

/// Threshold elevation relative to the 1 kHz reference (dB), per quarter-Bark
/// band edge from 0 to 25 Bark. Negative below the ear's most sensitive
/// region, rising steeply towards the top of the hearing range.
pub const FLETCHER_DB: [f64; 101] = [
    44.87865326562556, 31.775097624127902, 24.54695253713337, 19.90705961746405,
    16.649830058971624, 14.223497469492678, 12.33800978120197, 10.825569649096503,
    9.582017027788662, 8.539094896997447, 7.650107225565556, 6.881968859870822,
    6.210545157015508, 5.617791302022448, 5.089927137433246, 4.616233681477599,
    4.188236684371947, 3.79913881526647, 3.443415997698662, 3.116524755327591,
    2.8146862447166883, 2.534724272770379, 2.273941958599314, 2.030026471202261,
    1.8009744310480795, 1.5850326910697983, 1.3806506706874075, 1.186441431303193,
    1.0011493980848658, 0.8236231453088156, 0.6527920339342317, 0.48764576299433715,
    0.32721610026447934, 0.1705602133735491, 0.01674514536674554, -0.1351669195548646,
    -0.2861328642148582, -0.4371424975707501, -0.5892321496611554, -0.7434979818010268,
    -0.9011088633281648, -1.0633185050117278, -1.2314763328681622, -1.407036320722393,
    -1.5915626598640595, -1.7867307129706858, -1.9943211608038356, -2.216204590663477,
    -2.4543129892592215, -2.7105936981998395, -2.986940402023723, -3.285094722603832,
    -3.6065111299360733, -3.9521773813499417, -4.322382932220708, -4.7164292534155425,
    -5.132279479295823, -5.56615124566545, -6.01206708450419, -6.46139247820069,
    -6.902413513348028, -7.320034026924512, -7.6957044398342305, -8.007726283662015,
    -8.232098294132932, -8.344066489588437, -8.32049048491474, -8.143016901817653,
    -7.8018387154723, -7.299518060308882, -6.65400417787484, -5.8996990442645405,
    -5.085394237217535, -4.268339360188142, -3.5047382841797163, -2.838473883331496,
    -2.2912800178701334, -1.8579886773264565, -1.5090615521658874, -1.1994680023367446,
    -0.8796497274713042, -0.5031587281375871, -0.027712748842096513, 0.5897487466369511,
    1.4011539720550892, 2.476556545401422, 3.9151338348557494, 5.86060489630621,
    8.525260506079322, 12.229155625345241, 17.465961035106336, 25.017020320872664,
    36.155754858489246, 53.02850717480218, 79.39659829512134, 80.0,
    80.0, 80.0, 80.0, 80.0,
    80.0,
];

/// Behringer UB802 monitor path response (dB).
pub const BEHRINGER_DB: [f64; TABLE_LEN] = [
    -1.15, -1.25, -1.09, -0.84,
    -0.55, 0.01, 0.75, 1.48,
    2.26, 3.03, 3.76, 4.43,
    5.11, 5.71, 6.27, 6.79,
    7.28, 7.75, 8.21, 8.62,
    9.0, 9.37, 9.75, 10.08,
    10.42, 10.76, 11.1, 11.39,
    11.67, 11.95, 12.25, 12.48,
    12.72, 12.95, 13.19, 13.35,
    13.6, 13.79, 13.98, 14.16,
    14.34, 14.49, 14.69, 14.85,
    15.02, 15.18, 15.34, 15.45,
    15.59, 15.72, 15.84, 15.96,
    16.1, 16.23, 16.35, 16.47,
    16.58, 16.69, 16.78, 16.9,
    17.02, 17.11, 17.21, 17.32,
    17.39, 17.47, 17.56, 17.63,
    17.7, 17.77, 17.87, 17.97,
    18.06, 18.15, 18.23, 18.27,
    18.3, 18.39, 18.44, 18.52,
    18.6, 18.65, 18.69, 18.76,
    18.81, 18.87, 18.94, 18.99,
    19.06, 19.07, 19.13, 19.19,
    19.27, 19.31, 19.39, 19.43,
    19.46, 19.45, 19.49, 19.53,
    19.54, 19.57, 19.62, 19.66,
    19.69, 19.74, 19.78, 19.83,
    19.86, 19.92, 19.96, 20.0,
    20.01, 20.06, 20.1, 20.13,
    20.13, 20.16, 20.14, 20.1,
    20.02, 19.97, 19.93, 19.87,
    19.82, 19.76, 19.66, 19.6,
    19.53,
];

/// Allen & Heath GL3300 monitor path response (dB).
pub const ALLEN_HEATH_DB: [f64; TABLE_LEN] = [
    0.63, 0.62, 0.72, 1.01,
    1.14, 1.43, 1.85, 2.24,
    2.52, 2.89, 3.23, 3.5,
    3.78, 4.03, 4.27, 4.53,
    4.75, 5.01, 5.28, 5.52,
    5.75, 5.98, 6.18, 6.35,
    6.56, 6.77, 6.99, 7.19,
    7.39, 7.57, 7.74, 7.91,
    8.07, 8.25, 8.42, 8.59,
    8.73, 8.89, 9.05, 9.21,
    9.36, 9.52, 9.66, 9.8,
    9.93, 10.05, 10.18, 10.31,
    10.44, 10.56, 10.69, 10.8,
    10.91, 11.01, 11.11, 11.22,
    11.32, 11.41, 11.51, 11.61,
    11.69, 11.77, 11.86, 11.95,
    12.02, 12.12, 12.22, 12.3,
    12.38, 12.46, 12.53, 12.59,
    12.67, 12.74, 12.81, 12.87,
    12.94, 13.01, 13.06, 13.13,
    13.2, 13.27, 13.32, 13.38,
    13.43, 13.48, 13.52, 13.57,
    13.62, 13.67, 13.72, 13.77,
    13.82, 13.87, 13.9, 13.95,
    13.99, 14.03, 14.06, 14.1,
    14.14, 14.18, 14.22, 14.27,
    14.3, 14.34, 14.38, 14.42,
    14.45, 14.49, 14.52, 14.55,
    14.58, 14.61, 14.64, 14.68,
    14.71, 14.73, 14.79, 14.86,
    14.94, 14.99, 15.01, 14.87,
    14.5, 14.45, 14.58, 14.51,
    14.61,
];

/// Massenburg high-shelf monitor path response (dB).
pub const MASSENBURG_DB: [f64; TABLE_LEN] = [
    3.35, 3.32, 3.89, 4.6,
    5.31, 6.34, 7.09, 7.88,
    8.62, 9.3, 9.96, 10.36,
    10.92, 11.36, 11.78, 12.09,
    12.48, 12.76, 13.04, 13.27,
    13.49, 13.7, 13.92, 14.08,
    14.24, 14.39, 14.5, 14.64,
    14.75, 14.85, 14.95, 15.03,
    15.12, 15.22, 15.29, 15.33,
    15.41, 15.46, 15.51, 15.57,
    15.63, 15.67, 15.7, 15.74,
    15.8, 15.82, 15.84, 15.88,
    15.92, 15.93, 15.95, 15.99,
    16.01, 16.01, 16.03, 16.06,
    16.08, 16.08, 16.11, 16.13,
    16.13, 16.14, 16.16, 16.18,
    16.17, 16.18, 16.2, 16.2,
    16.19, 16.21, 16.23, 16.21,
    16.21, 16.23, 16.24, 16.23,
    16.23, 16.25, 16.25, 16.23,
    16.26, 16.28, 16.26, 16.24,
    16.27, 16.27, 16.24, 16.26,
    16.27, 16.27, 16.25, 16.26,
    16.28, 16.25, 16.25, 16.27,
    16.27, 16.24, 16.24, 16.25,
    16.26, 16.24, 16.26, 16.26,
    16.25, 16.24, 16.28, 16.27,
    16.24, 16.25, 16.28, 16.26,
    16.24, 16.27, 16.29, 16.26,
    16.26, 16.32, 16.36, 16.45,
    16.75, 17.13, 17.69, 18.56,
    19.73, 21.17, 23.42, 24.49,
    23.96,
];

/// Hyper-correction pre-emphasis (dB): -2 dB dip at 1.6 kHz, +3 dB shelf from
/// 4 kHz, expressed in SPL space. Only applied when enabled in the engine
/// configuration.
pub const HYPERCORRECTION_DB: [f64; TABLE_LEN] = [
    -0.0, -0.05, -0.21, -0.475,
    -0.824, -1.212, -1.572, -1.834,
    -1.955, -1.938, -1.815, -1.624,
    -1.394, -1.144, -0.884, -0.619,
    -0.353, -0.089, 0.17, 0.419,
    0.656, 0.878, 1.082, 1.269,
    1.439, 1.593, 1.732, 1.857,
    1.969, 2.07, 2.161, 2.242,
    2.314, 2.378, 2.434, 2.484,
    2.528, 2.566, 2.599, 2.627,
    2.652, 2.672, 2.689, 2.703,
    2.714, 2.723, 2.728, 2.732,
    2.733, 2.732, 2.73, 2.725,
    2.718, 2.71, 2.699, 2.687,
    2.674, 2.658, 2.641, 2.622,
    2.602, 2.579, 2.555, 2.53,
    2.502, 2.473, 2.442, 2.409,
    2.374, 2.337, 2.298, 2.257,
    2.215, 2.17, 2.123, 2.074,
    2.023, 1.969, 1.913, 1.855,
    1.794, 1.731, 1.666, 1.597,
    1.527, 1.453, 1.377, 1.298,
    1.216, 1.131, 1.043, 0.952,
    0.858, 0.761, 0.661, 0.557,
    0.45, 0.339, 0.225, 0.107,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0,
    0.0,
];
