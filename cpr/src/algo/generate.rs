//! Synthetic traces: random arrivals, departures and laxities.
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::helpe::*;

/// Rate of the Poisson arrival process, in clients per time step.
pub const POISSON_RATE: f64 = 0.7;
/// Share of clients drawn from the favoured half of a biased range.
pub const BIAS: f64 = 0.7;
/// Smallest exponent drawn by [LaxityDistribution::Powers].
pub const MIN_POWER: u32 = 4;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum ArrivalProcess {
    /// Uniform over `[0, 2n)`
    Uniform,
    /// Thirds of the clients arrive at `t = 1`, `t = n/2` and `t = n`
    Batched,
    /// Poisson process of rate 0.7
    Poisson,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum LaxityDistribution {
    /// Uniform over `[1, max]`
    Uniform,
    /// 70% of the clients in the lower half of `[1, max]`
    SmallBiased,
    /// 70% of the clients in the upper half of `[1, max]`
    LargeBiased,
    /// Powers of two `2^4..=max`, uniform over the exponent
    Powers,
}

/// Everything needed to reproduce a synthetic trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSpec {
    pub clients:    usize,
    pub max_laxity: Laxity,
    pub laxities:   LaxityDistribution,
    pub arrivals:   ArrivalProcess,
    pub seed:       u64,
}

impl TraceSpec {
    pub fn validate(&self) -> Result<(), GenError> {
        if self.clients == 0 {
            return Err(GenError::NoClients);
        }
        // Times go up to 2n.
        if self.clients > (ClientId::MAX / 2) as usize {
            return Err(GenError::TooManyClients(self.clients));
        }
        let min = match self.laxities {
            LaxityDistribution::Uniform     => 1,
            LaxityDistribution::SmallBiased |
            LaxityDistribution::LargeBiased => 2,
            LaxityDistribution::Powers      => 1 << MIN_POWER,
        };
        if self.max_laxity < min {
            return Err(GenError::LaxityRangeTooSmall {
                laxities:   self.laxities,
                max_laxity: self.max_laxity,
                min,
            });
        }

        Ok(())
    }

    /// A file name describing the distributions, e.g.
    /// `SmallBiasedLaxityPoissonArrivals_100clients_64w.xml`.
    pub fn file_name(&self, format: TraceFormat) -> String {
        let lax = match self.laxities {
            LaxityDistribution::Uniform     => "Unif",
            LaxityDistribution::SmallBiased => "SmallBiased",
            LaxityDistribution::LargeBiased => "LargeBiased",
            LaxityDistribution::Powers      => "Powers",
        };
        let arr = match self.arrivals {
            ArrivalProcess::Uniform => "Unif",
            ArrivalProcess::Batched => "Batched",
            ArrivalProcess::Poisson => "Poisson",
        };
        let ext = match format {
            TraceFormat::Txt => "txt",
            TraceFormat::Xml => "xml",
        };

        format!("{lax}Laxity{arr}Arrivals_{}clients_{}w.{ext}", self.clients, self.max_laxity)
    }
}

/// Knuth's method, fine for small means.
fn poisson(rng: &mut StdRng, mean: f64) -> Tick {
    let mut r = 0;
    let mut a: f64 = rng.gen();
    let mut p = (-mean).exp();
    while a > p {
        r += 1;
        a -= p;
        p = p * mean / r as f64;
    }

    r
}

fn draw_laxity(rng: &mut StdRng, dist: LaxityDistribution, max: Laxity) -> Laxity {
    let half = max / 2;
    let lower = |rng: &mut StdRng| rng.gen_range(1..=half);
    let upper = |rng: &mut StdRng| rng.gen_range(half + 1..=2 * half);
    match dist {
        LaxityDistribution::Uniform     => rng.gen_range(1..=max),
        LaxityDistribution::SmallBiased => {
            if rng.gen::<f64>() < BIAS { lower(rng) } else { upper(rng) }
        },
        LaxityDistribution::LargeBiased => {
            if rng.gen::<f64>() < BIAS { upper(rng) } else { lower(rng) }
        },
        LaxityDistribution::Powers      => 1 << rng.gen_range(MIN_POWER..=max.ilog2()),
    }
}

/// Draws a trace according to `spec`. Clients get ids `1..=n` in trace
/// order and laxities already rounded down to powers of two.
pub fn generate(spec: &TraceSpec) -> Result<ClientSet, GenError> {
    spec.validate()?;
    let n = spec.clients;
    let horizon = 2 * n;
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut arrival: Tick = 0;
    let mut res = Vec::with_capacity(n);
    for idx in 0..n {
        arrival = match spec.arrivals {
            ArrivalProcess::Uniform => rng.gen_range(0..horizon),
            ArrivalProcess::Batched => {
                if idx < n / 3 { 1 }
                else if idx < 2 * n / 3 { n / 2 }
                else { n }
            },
            ArrivalProcess::Poisson => arrival + poisson(&mut rng, POISSON_RATE),
        };
        let departure = if arrival < horizon { rng.gen_range(arrival..horizon) } else { arrival };
        let laxity = round_down_pow2(draw_laxity(&mut rng, spec.laxities, spec.max_laxity));
        // Bounded by `validate`.
        res.push(Client::new(idx as ClientId + 1, arrival, departure, laxity));
    }
    debug!(clients = n, seed = spec.seed, "trace generated");

    Ok(res)
}

//---START WRITERS
/// Writes the column-oriented text format read by [TxtTraceParser].
pub fn write_txt<W: Write>(mut out: W, clients: &[Client]) -> io::Result<()> {
    writeln!(out, "========================print out input==========================")?;
    writeln!(out, "it id  Arrive  weight    1/weight     Departure")?;
    for (item, c) in clients.iter().enumerate() {
        writeln!(
            out,
            "{:8}   {:8}   {:8}   {:5}   {:20.14}   {:8}",
            item,
            c.id.saturating_sub(1),
            c.arrival,
            c.laxity,
            c.weight(),
            c.departure
        )?;
    }

    out.flush()
}

/// Writes the XML format read by [XmlTraceParser].
pub fn write_xml<W: Write>(mut out: W, clients: &[Client]) -> io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><input>")?;
    for c in clients {
        writeln!(out, "<task>")?;
        writeln!(out, "   <id>{}</id>", c.id.saturating_sub(1))?;
        writeln!(out, "   <t_arrive>{}</t_arrive>", c.arrival)?;
        writeln!(out, "   <size>{}</size>", c.laxity)?;
        writeln!(out, "   <w_size>{}</w_size>", c.laxity)?;
        writeln!(out, "   <t_leave>{}</t_leave>", c.departure)?;
        writeln!(out, "</task>")?;
    }
    writeln!(out, "</input>")?;

    out.flush()
}

pub fn write_trace<W: Write>(out: W, clients: &[Client], format: TraceFormat) -> io::Result<()> {
    match format {
        TraceFormat::Txt => write_txt(out, clients),
        TraceFormat::Xml => write_xml(out, clients),
    }
}
//---END WRITERS
