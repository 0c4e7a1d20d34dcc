use gpig::gaussian::{Baseline, GaussianBand};
use gpig::pigments::RegressionModel;
use gpig::{InversionModel, PixelInput, RetrievalConfig, Spectrum};
use std::collections::BTreeMap;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Simulated Rrs at SeaWiFS-like wavelengths
    let wavelengths = vec![412.0, 443.0, 490.0, 555.0, 670.0];
    let rrs = vec![0.0021, 0.0034, 0.0041, 0.0028, 0.0012];

    let bands = vec![
        GaussianBand::new(440.0, 20.0, "chla"),
        GaussianBand::new(470.0, 14.0, "chlb"),
        GaussianBand::new(500.0, 16.0, "ppc"),
    ];
    let coefficients = BTreeMap::from([
        (
            "chla".to_string(),
            RegressionModel::PowerLaw {
                scale: 96.5,
                exponent: 1.06,
            },
        ),
        (
            "chlb".to_string(),
            RegressionModel::Linear {
                slope: 15.0,
                intercept: 0.0,
            },
        ),
        (
            "ppc".to_string(),
            RegressionModel::Polynomial {
                coefficients: vec![0.01, 20.0],
            },
        ),
    ]);

    let config = RetrievalConfig::new(wavelengths.clone(), bands, Baseline::None, coefficients)?
        .with_fit_window(400.0, 600.0);
    let model = InversionModel::new(&config)?;

    let reflectance = Spectrum::new(wavelengths, rrs)?;
    println!("{}", model.qaa(&reflectance, None)?);

    let retrieval = model
        .retrieve(&PixelInput::new(reflectance))
        .into_result()?;

    println!(
        "Fit: converged = {}, {} iterations, residual {:.3e} m^-1",
        retrieval.fit.converged, retrieval.fit.iterations, retrieval.fit.residual_norm
    );
    for (pigment, concentration) in retrieval.concentration.iter() {
        println!("  {pigment}: {concentration:.4} mg m^-3");
    }
    println!("Flags: {} {:?}", retrieval.flags, retrieval.flags.get_messages());

    Ok(())
}
